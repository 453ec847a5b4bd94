//! Core business logic for loopline.
//!
//! The relationship graph, group membership, the notification engine, and
//! the real-time dispatcher live here as services over the repository layer.

pub mod services;

pub use services::*;
