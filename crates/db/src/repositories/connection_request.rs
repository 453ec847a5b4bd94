//! Connection request repository.

use std::sync::Arc;

use crate::entities::{connection_request, ConnectionRequest};
use crate::entities::connection_request::ConnectionStatus;
use loopline_common::{AppError, AppResult};
use sea_orm::entity::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use super::map_db_err;

/// Condition matching requests exchanged between two users, either direction.
fn between(a: &str, b: &str) -> Condition {
    Condition::any()
        .add(
            Condition::all()
                .add(connection_request::Column::SenderId.eq(a))
                .add(connection_request::Column::ReceiverId.eq(b)),
        )
        .add(
            Condition::all()
                .add(connection_request::Column::SenderId.eq(b))
                .add(connection_request::Column::ReceiverId.eq(a)),
        )
}

/// Connection request repository for database operations.
#[derive(Clone)]
pub struct ConnectionRequestRepository {
    db: Arc<DatabaseConnection>,
}

impl ConnectionRequestRepository {
    /// Create a new connection request repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a connection request by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<connection_request::Model>> {
        ConnectionRequest::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the request from a sender to a receiver in any status.
    pub async fn find_by_pair(
        &self,
        sender_id: &str,
        receiver_id: &str,
    ) -> AppResult<Option<connection_request::Model>> {
        ConnectionRequest::find()
            .filter(connection_request::Column::SenderId.eq(sender_id))
            .filter(connection_request::Column::ReceiverId.eq(receiver_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the pending request from a sender to a receiver, if any.
    pub async fn find_pending_by_pair(
        &self,
        sender_id: &str,
        receiver_id: &str,
    ) -> AppResult<Option<connection_request::Model>> {
        ConnectionRequest::find()
            .filter(connection_request::Column::SenderId.eq(sender_id))
            .filter(connection_request::Column::ReceiverId.eq(receiver_id))
            .filter(connection_request::Column::Status.eq(ConnectionStatus::Pending))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Whether two users hold an accepted connection.
    pub async fn is_connected(&self, a: &str, b: &str) -> AppResult<bool> {
        let found = ConnectionRequest::find()
            .filter(between(a, b))
            .filter(connection_request::Column::Status.eq(ConnectionStatus::Accepted))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(found.is_some())
    }

    /// Create a connection request. A duplicate pending pair surfaces as a
    /// conflict.
    pub async fn create_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: connection_request::ActiveModel,
    ) -> AppResult<connection_request::Model> {
        model.insert(conn).await.map_err(map_db_err)
    }

    /// Move a request to a terminal status.
    pub async fn resolve_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        request: connection_request::Model,
        status: ConnectionStatus,
        responded_at: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<connection_request::Model> {
        let mut active: connection_request::ActiveModel = request.into();
        active.status = Set(status);
        active.responded_at = Set(Some(responded_at.into()));
        active
            .update(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Demote every accepted connection between two users back out of the
    /// connected state. Returns how many rows changed.
    pub async fn reject_accepted_between_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        a: &str,
        b: &str,
        responded_at: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<u64> {
        let result = ConnectionRequest::update_many()
            .filter(between(a, b))
            .filter(connection_request::Column::Status.eq(ConnectionStatus::Accepted))
            .col_expr(
                connection_request::Column::Status,
                Expr::value(ConnectionStatus::Rejected),
            )
            .col_expr(
                connection_request::Column::RespondedAt,
                Expr::value(DateTimeWithTimeZone::from(responded_at)),
            )
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Pending requests addressed to a user (paginated).
    pub async fn find_incoming(
        &self,
        receiver_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<connection_request::Model>> {
        let mut query = ConnectionRequest::find()
            .filter(connection_request::Column::ReceiverId.eq(receiver_id))
            .filter(connection_request::Column::Status.eq(ConnectionStatus::Pending))
            .order_by_desc(connection_request::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(connection_request::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_request(
        id: &str,
        sender_id: &str,
        receiver_id: &str,
        status: ConnectionStatus,
    ) -> connection_request::Model {
        connection_request::Model {
            id: id.to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            status,
            created_at: Utc::now().into(),
            responded_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_pending_by_pair_found() {
        let request = create_test_request("r1", "user1", "user2", ConnectionStatus::Pending);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[request.clone()]])
                .into_connection(),
        );

        let repo = ConnectionRequestRepository::new(db);
        let result = repo.find_pending_by_pair("user1", "user2").await.unwrap();

        assert!(result.is_some());
        assert_eq!(result.unwrap().id, "r1");
    }

    #[tokio::test]
    async fn test_is_connected_false_when_no_accepted_row() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<connection_request::Model>::new()])
                .into_connection(),
        );

        let repo = ConnectionRequestRepository::new(db);
        let connected = repo.is_connected("user1", "user2").await.unwrap();

        assert!(!connected);
    }

    #[tokio::test]
    async fn test_resolve_sets_status_and_timestamp() {
        let pending = create_test_request("r1", "user1", "user2", ConnectionStatus::Pending);
        let now = Utc::now();
        let mut accepted = pending.clone();
        accepted.status = ConnectionStatus::Accepted;
        accepted.responded_at = Some(now.into());

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[accepted.clone()]])
                .into_connection(),
        );

        let repo = ConnectionRequestRepository::new(db.clone());
        let result = repo
            .resolve_in(db.as_ref(), pending, ConnectionStatus::Accepted, now)
            .await
            .unwrap();

        assert_eq!(result.status, ConnectionStatus::Accepted);
        assert!(result.responded_at.is_some());
    }
}
