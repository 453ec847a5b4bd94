//! Status post repository.

use std::sync::Arc;

use crate::entities::{status_post, StatusPost};
use loopline_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

use super::map_db_err;

/// Status post repository for database operations.
#[derive(Clone)]
pub struct StatusPostRepository {
    db: Arc<DatabaseConnection>,
}

impl StatusPostRepository {
    /// Create a new status post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<status_post::Model>> {
        StatusPost::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a post.
    pub async fn create_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: status_post::ActiveModel,
    ) -> AppResult<status_post::Model> {
        model.insert(conn).await.map_err(map_db_err)
    }

    /// Posts by an author, newest first (paginated).
    pub async fn find_by_author(
        &self,
        author_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<status_post::Model>> {
        let mut query = StatusPost::find()
            .filter(status_post::Column::AuthorId.eq(author_id))
            .order_by_desc(status_post::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(status_post::Column::Id.lt(id));
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
    async fn test_find_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<status_post::Model>::new()])
                .into_connection(),
        );

        let repo = StatusPostRepository::new(db);
        assert!(repo.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_author() {
        let post = status_post::Model {
            id: "p1".to_string(),
            author_id: "user1".to_string(),
            content: "hello".to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[post]])
                .into_connection(),
        );

        let repo = StatusPostRepository::new(db);
        let posts = repo.find_by_author("user1", 10, None).await.unwrap();

        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].author_id, "user1");
    }
}
