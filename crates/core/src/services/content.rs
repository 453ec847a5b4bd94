//! Content service.
//!
//! Thin write path for posts, comments, and likes. It exists so interaction
//! notifications and live-post fan-out ride the same transaction-then-dispatch
//! flow as the graph mutations.

use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use loopline_common::{AppError, AppResult, IdGenerator, SharedClock, SystemClock};
use loopline_db::entities::{comment, like, status_post, EntityKind, EntityRef};
use loopline_db::repositories::{
    CommentRepository, FollowRepository, LikeRepository, StatusPostRepository,
};

use super::notification::NotificationService;
use super::realtime::RealtimeDispatcher;

/// Input for creating a status post.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePostInput {
    /// Post body.
    #[validate(length(min = 1, max = 5000, message = "Content must be 1-5000 characters"))]
    pub content: String,
}

/// Input for creating a comment.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCommentInput {
    /// The post the comment belongs to.
    pub post_id: String,
    /// Parent comment when replying to a comment instead of the post.
    pub parent_id: Option<String>,
    /// Comment body.
    #[validate(length(min = 1, max = 2000, message = "Content must be 1-2000 characters"))]
    pub content: String,
}

/// Content service for business logic.
#[derive(Clone)]
pub struct ContentService {
    db: Arc<DatabaseConnection>,
    post_repo: StatusPostRepository,
    comment_repo: CommentRepository,
    like_repo: LikeRepository,
    follow_repo: FollowRepository,
    notifications: Option<Arc<NotificationService>>,
    dispatcher: Option<RealtimeDispatcher>,
    id_gen: IdGenerator,
    clock: SharedClock,
}

impl ContentService {
    /// Create a new content service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        post_repo: StatusPostRepository,
        comment_repo: CommentRepository,
        like_repo: LikeRepository,
        follow_repo: FollowRepository,
    ) -> Self {
        Self {
            db,
            post_repo,
            comment_repo,
            like_repo,
            follow_repo,
            notifications: None,
            dispatcher: None,
            id_gen: IdGenerator::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Set the notification engine invoked inside each mutation.
    pub fn set_notifications(&mut self, notifications: Arc<NotificationService>) {
        self.notifications = Some(notifications);
    }

    /// Set the real-time dispatcher used for live-post fan-out.
    pub fn set_dispatcher(&mut self, dispatcher: RealtimeDispatcher) {
        self.dispatcher = Some(dispatcher);
    }

    /// Replace the clock.
    pub fn set_clock(&mut self, clock: SharedClock) {
        self.clock = clock;
    }

    /// Create a post. Mention notifications are written in the same
    /// transaction; after commit, online followers get a live-post signal.
    pub async fn create_post(
        &self,
        author_id: &str,
        input: CreatePostInput,
    ) -> AppResult<status_post::Model> {
        input.validate()?;

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let model = status_post::ActiveModel {
            id: Set(self.id_gen.generate()),
            author_id: Set(author_id.to_string()),
            content: Set(input.content),
            created_at: Set(self.clock.now().into()),
            updated_at: Set(None),
        };
        let post = self.post_repo.create_in(&txn, model).await?;

        let created = match self.notifications {
            Some(ref notifications) => notifications.handle_post_created_in(&txn, &post).await?,
            None => Vec::new(),
        };

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if let Some(ref notifications) = self.notifications {
            notifications.dispatch_created(&created).await;
        }

        if let Some(ref dispatcher) = self.dispatcher {
            match self.follow_repo.follower_ids(author_id).await {
                Ok(follower_ids) => {
                    dispatcher.publish_new_post(&post.id, &follower_ids).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, post_id = %post.id, "Failed to load followers for live post fan-out");
                }
            }
        }

        Ok(post)
    }

    /// Create a comment on a post, or a reply when `parent_id` is set. The
    /// parent must be a comment on the same post.
    pub async fn create_comment(
        &self,
        author_id: &str,
        input: CreateCommentInput,
    ) -> AppResult<comment::Model> {
        input.validate()?;

        self.post_repo
            .find_by_id(&input.post_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

        if let Some(ref parent_id) = input.parent_id {
            let parent = self
                .comment_repo
                .find_by_id(parent_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Parent comment not found".to_string()))?;

            let on_same_post = parent.target_kind == EntityKind::Post
                && parent.target_id == input.post_id;
            if !on_same_post {
                return Err(AppError::BadRequest(
                    "Parent comment belongs to a different post".to_string(),
                ));
            }
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            author_id: Set(author_id.to_string()),
            target_kind: Set(EntityKind::Post),
            target_id: Set(input.post_id),
            parent_id: Set(input.parent_id),
            content: Set(input.content),
            created_at: Set(self.clock.now().into()),
            updated_at: Set(None),
        };
        let comment = self.comment_repo.create_in(&txn, model).await?;

        let created = match self.notifications {
            Some(ref notifications) => {
                notifications.handle_comment_created_in(&txn, &comment).await?
            }
            None => Vec::new(),
        };

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if let Some(ref notifications) = self.notifications {
            notifications.dispatch_created(&created).await;
        }

        Ok(comment)
    }

    /// Like a post or comment.
    pub async fn like(&self, user_id: &str, target: EntityRef) -> AppResult<like::Model> {
        if !matches!(target.kind, EntityKind::Post | EntityKind::Comment) {
            return Err(AppError::BadRequest(
                "Only posts and comments can be liked".to_string(),
            ));
        }

        self.ensure_target_exists(&target).await?;

        if self
            .like_repo
            .find_by_user_and_target(user_id, target.kind, &target.id)
            .await?
            .is_some()
        {
            return Err(AppError::BadRequest("Already liked".to_string()));
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let model = like::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            target_kind: Set(target.kind),
            target_id: Set(target.id),
            created_at: Set(self.clock.now().into()),
        };
        let like = self.like_repo.create_in(&txn, model).await?;

        let created = match self.notifications {
            Some(ref notifications) => notifications.handle_like_created_in(&txn, &like).await?,
            None => Vec::new(),
        };

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if let Some(ref notifications) = self.notifications {
            notifications.dispatch_created(&created).await;
        }

        Ok(like)
    }

    /// Remove a like.
    pub async fn unlike(&self, user_id: &str, target: EntityRef) -> AppResult<()> {
        let removed = self
            .like_repo
            .delete_by_user_and_target_in(self.db.as_ref(), user_id, target.kind, &target.id)
            .await?;

        if !removed {
            return Err(AppError::BadRequest("Not liked".to_string()));
        }

        Ok(())
    }

    async fn ensure_target_exists(&self, target: &EntityRef) -> AppResult<()> {
        let found = match target.kind {
            EntityKind::Post => self.post_repo.find_by_id(&target.id).await?.is_some(),
            EntityKind::Comment => self.comment_repo.find_by_id(&target.id).await?.is_some(),
            _ => false,
        };

        if found {
            Ok(())
        } else {
            Err(AppError::NotFound("Target not found".to_string()))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn service(db: Arc<DatabaseConnection>) -> ContentService {
        ContentService::new(
            db.clone(),
            StatusPostRepository::new(db.clone()),
            CommentRepository::new(db.clone()),
            LikeRepository::new(db.clone()),
            FollowRepository::new(db),
        )
    }

    fn test_post(id: &str, author_id: &str) -> status_post::Model {
        status_post::Model {
            id: id.to_string(),
            author_id: author_id.to_string(),
            content: "hello".to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn test_comment(id: &str, author_id: &str, post_id: &str) -> comment::Model {
        comment::Model {
            id: id.to_string(),
            author_id: author_id.to_string(),
            target_kind: EntityKind::Post,
            target_id: post_id.to_string(),
            parent_id: None,
            content: "nice".to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[test]
    fn test_create_post_input_validates_length() {
        let input = CreatePostInput {
            content: String::new(),
        };
        assert!(input.validate().is_err());
    }

    #[tokio::test]
    async fn test_create_post_without_collaborators() {
        let post = test_post("p1", "u1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[post]])
                .into_connection(),
        );
        let svc = service(db);

        let created = svc
            .create_post(
                "u1",
                CreatePostInput {
                    content: "hello".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(created.author_id, "u1");
    }

    #[tokio::test]
    async fn test_create_comment_rejects_missing_post() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<status_post::Model>::new()])
                .into_connection(),
        );
        let svc = service(db);

        let err = svc
            .create_comment(
                "u1",
                CreateCommentInput {
                    post_id: "missing".to_string(),
                    parent_id: None,
                    content: "nice".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_comment_rejects_parent_from_other_post() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_post("p1", "u1")]])
                // parent comment hangs off a different post
                .append_query_results([[test_comment("c1", "u2", "p2")]])
                .into_connection(),
        );
        let svc = service(db);

        let err = svc
            .create_comment(
                "u1",
                CreateCommentInput {
                    post_id: "p1".to_string(),
                    parent_id: Some("c1".to_string()),
                    content: "nice".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.contains("different post")));
    }

    #[tokio::test]
    async fn test_like_rejects_duplicate() {
        let existing = like::Model {
            id: "l1".to_string(),
            user_id: "u1".to_string(),
            target_kind: EntityKind::Post,
            target_id: "p1".to_string(),
            created_at: Utc::now().into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_post("p1", "u2")]])
                .append_query_results([[existing]])
                .into_connection(),
        );
        let svc = service(db);

        let err = svc
            .like("u1", EntityRef::post("p1".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "Already liked"));
    }

    #[tokio::test]
    async fn test_like_rejects_unlikeable_target() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let svc = service(db);

        let err = svc
            .like("u1", EntityRef::group("g1".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_unlike_missing_like() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );
        let svc = service(db);

        let err = svc
            .unlike("u1", EntityRef::post("p1".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "Not liked"));
    }
}
