//! Notification repository.

use std::sync::Arc;

use crate::entities::{notification, EntityKind, Notification};
use loopline_common::{AppError, AppResult};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};

/// Notification repository for database operations.
#[derive(Clone)]
pub struct NotificationRepository {
    db: Arc<DatabaseConnection>,
}

impl NotificationRepository {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a notification by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<notification::Model>> {
        Notification::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Whether a notification already exists for this recipient, actor, and
    /// action object.
    pub async fn exists_for_action<C: ConnectionTrait>(
        &self,
        conn: &C,
        recipient_id: &str,
        actor_id: &str,
        action_object_kind: EntityKind,
        action_object_id: &str,
    ) -> AppResult<bool> {
        let found = Notification::find()
            .filter(notification::Column::RecipientId.eq(recipient_id))
            .filter(notification::Column::ActorId.eq(actor_id))
            .filter(notification::Column::ActionObjectKind.eq(action_object_kind))
            .filter(notification::Column::ActionObjectId.eq(action_object_id))
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(found.is_some())
    }

    /// Insert a notification.
    ///
    /// The dedup index on `(recipient, actor, action object)` turns a racing
    /// duplicate into `Ok(None)`: the action was already notified, which is
    /// what the caller wanted.
    pub async fn create_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: notification::ActiveModel,
    ) -> AppResult<Option<notification::Model>> {
        match model.insert(conn).await {
            Ok(created) => Ok(Some(created)),
            Err(e) => match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => Ok(None),
                _ => Err(AppError::Database(e.to_string())),
            },
        }
    }

    /// Notifications for a user, newest first (paginated).
    pub async fn find_by_user(
        &self,
        recipient_id: &str,
        limit: u64,
        until_id: Option<&str>,
        unread_only: bool,
    ) -> AppResult<Vec<notification::Model>> {
        let mut query = Notification::find()
            .filter(notification::Column::RecipientId.eq(recipient_id))
            .order_by_desc(notification::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(notification::Column::Id.lt(id));
        }

        if unread_only {
            query = query.filter(notification::Column::IsRead.eq(false));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark one notification as read.
    pub async fn mark_as_read(&self, notification: notification::Model) -> AppResult<()> {
        let mut active: notification::ActiveModel = notification.into();
        active.is_read = Set(true);
        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Mark every unread notification of a user as read. Returns the count.
    pub async fn mark_all_as_read(&self, recipient_id: &str) -> AppResult<u64> {
        let result = Notification::update_many()
            .filter(notification::Column::RecipientId.eq(recipient_id))
            .filter(notification::Column::IsRead.eq(false))
            .col_expr(notification::Column::IsRead, Expr::value(true))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Count unread notifications for a user.
    pub async fn count_unread(&self, recipient_id: &str) -> AppResult<u64> {
        Notification::find()
            .filter(notification::Column::RecipientId.eq(recipient_id))
            .filter(notification::Column::IsRead.eq(false))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::notification::NotificationType;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_notification(id: &str, recipient_id: &str, is_read: bool) -> notification::Model {
        notification::Model {
            id: id.to_string(),
            recipient_id: recipient_id.to_string(),
            actor_id: "actor".to_string(),
            notification_type: NotificationType::Like,
            verb: "liked your post".to_string(),
            action_object_kind: EntityKind::Like,
            action_object_id: "l1".to_string(),
            target_kind: Some(EntityKind::Post),
            target_id: Some("p1".to_string()),
            is_read,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_exists_for_action_true() {
        let existing = create_test_notification("n1", "user1", false);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db.clone());
        let exists = repo
            .exists_for_action(db.as_ref(), "user1", "actor", EntityKind::Like, "l1")
            .await
            .unwrap();

        assert!(exists);
    }

    #[tokio::test]
    async fn test_find_by_user_unread_only() {
        let unread = create_test_notification("n2", "user1", false);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[unread]])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let result = repo.find_by_user("user1", 10, None, true).await.unwrap();

        assert_eq!(result.len(), 1);
        assert!(!result[0].is_read);
    }

    #[tokio::test]
    async fn test_create_in_returns_model() {
        let created = create_test_notification("n1", "user1", false);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[created.clone()]])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db.clone());
        let active = notification::ActiveModel {
            id: Set("n1".to_string()),
            recipient_id: Set("user1".to_string()),
            actor_id: Set("actor".to_string()),
            notification_type: Set(NotificationType::Like),
            verb: Set("liked your post".to_string()),
            action_object_kind: Set(EntityKind::Like),
            action_object_id: Set("l1".to_string()),
            target_kind: Set(Some(EntityKind::Post)),
            target_id: Set(Some("p1".to_string())),
            is_read: Set(false),
            created_at: Set(Utc::now().into()),
        };

        let result = repo.create_in(db.as_ref(), active).await.unwrap();
        assert!(result.is_some());
    }
}
