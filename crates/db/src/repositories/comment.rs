//! Comment repository.

use std::sync::Arc;

use crate::entities::{comment, Comment, EntityKind};
use loopline_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

use super::map_db_err;

/// Comment repository for database operations.
#[derive(Clone)]
pub struct CommentRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentRepository {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a comment by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<comment::Model>> {
        Comment::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a comment.
    pub async fn create_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: comment::ActiveModel,
    ) -> AppResult<comment::Model> {
        model.insert(conn).await.map_err(map_db_err)
    }

    /// Comments on a target, oldest first (paginated by `since_id`).
    pub async fn find_for_target(
        &self,
        target_kind: EntityKind,
        target_id: &str,
        limit: u64,
        since_id: Option<&str>,
    ) -> AppResult<Vec<comment::Model>> {
        let mut query = Comment::find()
            .filter(comment::Column::TargetKind.eq(target_kind))
            .filter(comment::Column::TargetId.eq(target_id))
            .order_by_asc(comment::Column::Id);

        if let Some(id) = since_id {
            query = query.filter(comment::Column::Id.gt(id));
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

    #[tokio::test]
    async fn test_find_for_target() {
        let comment = comment::Model {
            id: "c1".to_string(),
            author_id: "user1".to_string(),
            target_kind: EntityKind::Post,
            target_id: "p1".to_string(),
            parent_id: None,
            content: "nice".to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[comment]])
                .into_connection(),
        );

        let repo = CommentRepository::new(db);
        let comments = repo
            .find_for_target(EntityKind::Post, "p1", 10, None)
            .await
            .unwrap();

        assert_eq!(comments.len(), 1);
        assert!(!comments[0].is_reply());
    }
}
