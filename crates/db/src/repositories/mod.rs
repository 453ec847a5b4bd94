//! Repository layer over the entity definitions.
//!
//! Read methods run on the shared connection pool. Write methods are suffixed
//! `_in` and take any [`sea_orm::ConnectionTrait`] so services can run them
//! inside a transaction.

pub mod comment;
pub mod connection_request;
pub mod follow;
pub mod group;
pub mod like;
pub mod notification;
pub mod status_post;
pub mod user;

pub use comment::CommentRepository;
pub use connection_request::ConnectionRequestRepository;
pub use follow::FollowRepository;
pub use group::GroupRepository;
pub use like::LikeRepository;
pub use notification::NotificationRepository;
pub use status_post::StatusPostRepository;
pub use user::UserRepository;

use loopline_common::AppError;
use sea_orm::{DbErr, SqlErr};

/// Map a database error, surfacing unique-index violations as conflicts.
///
/// Unique indexes are the authority on "already exists" races; callers that
/// pre-check and still hit the index report [`AppError::Conflict`] instead of
/// a generic database failure.
pub(crate) fn map_db_err(e: DbErr) -> AppError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(msg)) => AppError::Conflict(msg),
        _ => AppError::Database(e.to_string()),
    }
}
