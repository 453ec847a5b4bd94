//! Pub/sub backends for real-time delivery.
//!
//! Two implementations of the core [`loopline_core::PubSub`] trait: an
//! in-process broadcast table for tests and single-node deployments, and a
//! Redis-backed one for cross-instance fan-out.

pub mod memory;
pub mod redis;

pub use memory::MemoryPubSub;
pub use redis::RedisPubSub;
