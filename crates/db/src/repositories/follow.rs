//! Follow repository.

use std::sync::Arc;

use crate::entities::{follow, Follow};
use loopline_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

use super::map_db_err;

/// Follow repository for database operations.
#[derive(Clone)]
pub struct FollowRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowRepository {
    /// Create a new follow repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a follow edge by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<follow::Model>> {
        Follow::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a follow edge by follower and followee.
    pub async fn find_by_pair(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<follow::Model>> {
        Follow::find()
            .filter(follow::Column::FollowerId.eq(follower_id))
            .filter(follow::Column::FolloweeId.eq(followee_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if a user is following another user.
    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        Ok(self.find_by_pair(follower_id, followee_id).await?.is_some())
    }

    /// Create a follow edge. A duplicate pair surfaces as a conflict.
    pub async fn create_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: follow::ActiveModel,
    ) -> AppResult<follow::Model> {
        model.insert(conn).await.map_err(map_db_err)
    }

    /// Delete a follow edge by pair. Returns whether an edge was removed.
    pub async fn delete_by_pair_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<bool> {
        let result = Follow::delete_many()
            .filter(follow::Column::FollowerId.eq(follower_id))
            .filter(follow::Column::FolloweeId.eq(followee_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected > 0)
    }

    /// Get follow edges where the user is the follower (paginated).
    pub async fn find_following(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow::Model>> {
        let mut query = Follow::find()
            .filter(follow::Column::FollowerId.eq(user_id))
            .order_by_desc(follow::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(follow::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get follow edges where the user is the followee (paginated).
    pub async fn find_followers(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow::Model>> {
        let mut query = Follow::find()
            .filter(follow::Column::FolloweeId.eq(user_id))
            .order_by_desc(follow::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(follow::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Ids of every user following the given user, for fan-out.
    pub async fn follower_ids(&self, user_id: &str) -> AppResult<Vec<String>> {
        let edges = Follow::find()
            .filter(follow::Column::FolloweeId.eq(user_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(edges.into_iter().map(|e| e.follower_id).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_follow(id: &str, follower_id: &str, followee_id: &str) -> follow::Model {
        follow::Model {
            id: id.to_string(),
            follower_id: follower_id.to_string(),
            followee_id: followee_id.to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_pair_found() {
        let edge = create_test_follow("f1", "user1", "user2");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[edge.clone()]])
                .into_connection(),
        );

        let repo = FollowRepository::new(db);
        let result = repo.find_by_pair("user1", "user2").await.unwrap();

        assert!(result.is_some());
        assert_eq!(result.unwrap().id, "f1");
    }

    #[tokio::test]
    async fn test_is_following_false() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<follow::Model>::new()])
                .into_connection(),
        );

        let repo = FollowRepository::new(db);
        let result = repo.is_following("user1", "user3").await.unwrap();

        assert!(!result);
    }

    #[tokio::test]
    async fn test_delete_by_pair_reports_missing_edge() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = FollowRepository::new(db.clone());
        let removed = repo
            .delete_by_pair_in(db.as_ref(), "user1", "user2")
            .await
            .unwrap();

        assert!(!removed);
    }

    #[tokio::test]
    async fn test_follower_ids() {
        let f1 = create_test_follow("f1", "user2", "user1");
        let f2 = create_test_follow("f2", "user3", "user1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[f1, f2]])
                .into_connection(),
        );

        let repo = FollowRepository::new(db);
        let ids = repo.follower_ids("user1").await.unwrap();

        assert_eq!(ids, vec!["user2".to_string(), "user3".to_string()]);
    }
}
