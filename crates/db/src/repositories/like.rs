//! Like repository.

use std::sync::Arc;

use crate::entities::{like, EntityKind, Like};
use loopline_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter,
};

use super::map_db_err;

/// Like repository for database operations.
#[derive(Clone)]
pub struct LikeRepository {
    db: Arc<DatabaseConnection>,
}

impl LikeRepository {
    /// Create a new like repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a like by user and target.
    pub async fn find_by_user_and_target(
        &self,
        user_id: &str,
        target_kind: EntityKind,
        target_id: &str,
    ) -> AppResult<Option<like::Model>> {
        Like::find()
            .filter(like::Column::UserId.eq(user_id))
            .filter(like::Column::TargetKind.eq(target_kind))
            .filter(like::Column::TargetId.eq(target_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a like. Liking the same target twice surfaces as a conflict.
    pub async fn create_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: like::ActiveModel,
    ) -> AppResult<like::Model> {
        model.insert(conn).await.map_err(map_db_err)
    }

    /// Remove a like. Returns whether a like existed.
    pub async fn delete_by_user_and_target_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        target_kind: EntityKind,
        target_id: &str,
    ) -> AppResult<bool> {
        let result = Like::delete_many()
            .filter(like::Column::UserId.eq(user_id))
            .filter(like::Column::TargetKind.eq(target_kind))
            .filter(like::Column::TargetId.eq(target_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected > 0)
    }

    /// Count likes on a target.
    pub async fn count_for_target(
        &self,
        target_kind: EntityKind,
        target_id: &str,
    ) -> AppResult<u64> {
        Like::find()
            .filter(like::Column::TargetKind.eq(target_kind))
            .filter(like::Column::TargetId.eq(target_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn test_find_by_user_and_target_found() {
        let like = like::Model {
            id: "l1".to_string(),
            user_id: "user1".to_string(),
            target_kind: EntityKind::Post,
            target_id: "p1".to_string(),
            created_at: Utc::now().into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[like]])
                .into_connection(),
        );

        let repo = LikeRepository::new(db);
        let result = repo
            .find_by_user_and_target("user1", EntityKind::Post, "p1")
            .await
            .unwrap();

        assert!(result.is_some());
    }

    #[tokio::test]
    async fn test_delete_reports_missing_like() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = LikeRepository::new(db.clone());
        let removed = repo
            .delete_by_user_and_target_in(db.as_ref(), "user1", EntityKind::Post, "p1")
            .await
            .unwrap();

        assert!(!removed);
    }
}
