//! Notification engine.
//!
//! The single place that turns domain events and content events into
//! notification rows. Producers never write notifications themselves; they
//! hand the engine an event inside their transaction and the engine applies
//! the policy table: who is notified, with which verb, about which objects.
//!
//! Two suppression rules apply to every write: an actor never notifies
//! themselves, and a (recipient, actor, action object) triple never notifies
//! twice. The second rule is checked up front and backed by a unique index,
//! so racing producers collapse to a single row.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{ConnectionTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use loopline_common::{AppError, AppResult, IdGenerator, SharedClock, SystemClock};
use loopline_db::entities::notification::NotificationType;
use loopline_db::entities::{comment, like, notification, status_post, user, EntityKind, EntityRef};
use loopline_db::repositories::{
    CommentRepository, GroupRepository, NotificationRepository, StatusPostRepository,
    UserRepository,
};

use super::events::DomainEvent;
use super::realtime::RealtimeDispatcher;

/// Maximum length of a rendered context snippet, in characters.
const SNIPPET_MAX_CHARS: usize = 75;

static MENTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@(\w+)").expect("mention pattern is valid"));

/// Username lookup for mention resolution.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve a username to a user, if one exists. Case-insensitive.
    async fn resolve(&self, username: &str) -> AppResult<Option<user::Model>>;
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn resolve(&self, username: &str) -> AppResult<Option<user::Model>> {
        self.find_by_username(username).await
    }
}

/// One notification request, before policy suppression.
#[derive(Debug, Clone)]
pub struct NotifyInput {
    pub recipient_id: String,
    pub actor_id: String,
    pub notification_type: NotificationType,
    pub verb: String,
    pub action_object: EntityRef,
    pub target: Option<EntityRef>,
}

/// A resolved reference in a rendered notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefView {
    pub kind: EntityKind,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_text: Option<String>,
}

/// The actor of a rendered notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorView {
    pub id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

/// The wire payload of a notification, as pushed over the socket and served
/// by the read path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationView {
    pub id: String,
    pub actor: ActorView,
    pub verb: String,
    pub notification_type: NotificationType,
    pub action_object: RefView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<RefView>,
    pub timestamp: chrono::DateTime<chrono::FixedOffset>,
    pub is_read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_snippet: Option<String>,
}

/// Notification engine and read path.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    user_repo: UserRepository,
    post_repo: StatusPostRepository,
    comment_repo: CommentRepository,
    group_repo: GroupRepository,
    directory: Arc<dyn UserDirectory>,
    dispatcher: Option<RealtimeDispatcher>,
    id_gen: IdGenerator,
    clock: SharedClock,
}

impl NotificationService {
    /// Create a new notification service. Mentions resolve against the user
    /// repository unless a custom directory is set.
    #[must_use]
    pub fn new(
        notification_repo: NotificationRepository,
        user_repo: UserRepository,
        post_repo: StatusPostRepository,
        comment_repo: CommentRepository,
        group_repo: GroupRepository,
    ) -> Self {
        let directory: Arc<dyn UserDirectory> = Arc::new(user_repo.clone());
        Self {
            notification_repo,
            user_repo,
            post_repo,
            comment_repo,
            group_repo,
            directory,
            dispatcher: None,
            id_gen: IdGenerator::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the mention directory.
    pub fn set_directory(&mut self, directory: Arc<dyn UserDirectory>) {
        self.directory = directory;
    }

    /// Set the real-time dispatcher used after commit.
    pub fn set_dispatcher(&mut self, dispatcher: RealtimeDispatcher) {
        self.dispatcher = Some(dispatcher);
    }

    /// Replace the clock.
    pub fn set_clock(&mut self, clock: SharedClock) {
        self.clock = clock;
    }

    /// The single write entry point.
    ///
    /// Returns `Ok(None)` when a suppression rule fires: self-notification,
    /// or a notification for the same (recipient, actor, action object)
    /// already exists.
    pub async fn notify_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        input: NotifyInput,
    ) -> AppResult<Option<notification::Model>> {
        if input.recipient_id == input.actor_id {
            return Ok(None);
        }

        if self
            .notification_repo
            .exists_for_action(
                conn,
                &input.recipient_id,
                &input.actor_id,
                input.action_object.kind,
                &input.action_object.id,
            )
            .await?
        {
            return Ok(None);
        }

        let (target_kind, target_id) = match input.target {
            Some(target) => (Some(target.kind), Some(target.id)),
            None => (None, None),
        };

        let model = notification::ActiveModel {
            id: Set(self.id_gen.generate()),
            recipient_id: Set(input.recipient_id),
            actor_id: Set(input.actor_id),
            notification_type: Set(input.notification_type),
            verb: Set(input.verb),
            action_object_kind: Set(input.action_object.kind),
            action_object_id: Set(input.action_object.id),
            target_kind: Set(target_kind),
            target_id: Set(target_id),
            is_read: Set(false),
            created_at: Set(self.clock.now().into()),
        };

        self.notification_repo.create_in(conn, model).await
    }

    /// Apply the policy table to a relationship or group event.
    ///
    /// Events without a policy row (connection requested/accepted, public
    /// group joined) materialize nothing.
    pub async fn handle_event_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        event: &DomainEvent,
    ) -> AppResult<Vec<notification::Model>> {
        let input = match event {
            DomainEvent::Followed { follow } => NotifyInput {
                recipient_id: follow.followee_id.clone(),
                actor_id: follow.follower_id.clone(),
                notification_type: NotificationType::Follow,
                verb: "started following you".to_string(),
                action_object: EntityRef::new(EntityKind::Follow, follow.id.clone()),
                target: None,
            },
            DomainEvent::GroupJoinRequested { request, group } => NotifyInput {
                recipient_id: group.creator_id.clone(),
                actor_id: request.user_id.clone(),
                notification_type: NotificationType::GroupJoinRequest,
                verb: "sent a request to join".to_string(),
                action_object: EntityRef::new(EntityKind::GroupJoinRequest, request.id.clone()),
                target: Some(EntityRef::group(group.id.clone())),
            },
            DomainEvent::GroupJoinApproved {
                request,
                group,
                approved_by,
            } => NotifyInput {
                recipient_id: request.user_id.clone(),
                actor_id: approved_by.clone(),
                notification_type: NotificationType::GroupJoinApproved,
                verb: "approved your request to join the group".to_string(),
                action_object: EntityRef::new(EntityKind::GroupJoinRequest, request.id.clone()),
                target: Some(EntityRef::group(group.id.clone())),
            },
            DomainEvent::ConnectionRequested { .. }
            | DomainEvent::ConnectionAccepted { .. }
            | DomainEvent::GroupJoined { .. } => return Ok(Vec::new()),
        };

        Ok(self.notify_in(conn, input).await?.into_iter().collect())
    }

    /// A like was created: notify the author of the liked object.
    pub async fn handle_like_created_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        like: &like::Model,
    ) -> AppResult<Vec<notification::Model>> {
        let (recipient_id, verb) = match like.target_kind {
            EntityKind::Post => {
                let post = self
                    .post_repo
                    .find_by_id(&like.target_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;
                (post.author_id, "liked your post".to_string())
            }
            EntityKind::Comment => {
                let comment = self
                    .comment_repo
                    .find_by_id(&like.target_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;
                let verb = if comment.is_reply() {
                    "liked your reply"
                } else {
                    "liked your comment"
                };
                (comment.author_id, verb.to_string())
            }
            _ => return Ok(Vec::new()),
        };

        let input = NotifyInput {
            recipient_id,
            actor_id: like.user_id.clone(),
            notification_type: NotificationType::Like,
            verb,
            action_object: EntityRef::new(EntityKind::Like, like.id.clone()),
            target: Some(like.target_ref()),
        };

        Ok(self.notify_in(conn, input).await?.into_iter().collect())
    }

    /// A comment was created: comment/reply rule first, then the mention
    /// rule. The dedup check makes the first rule win for a recipient hit by
    /// both.
    pub async fn handle_comment_created_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        comment: &comment::Model,
    ) -> AppResult<Vec<notification::Model>> {
        let mut created = Vec::new();
        let action_object = EntityRef::comment(comment.id.clone());

        if let Some(ref parent_id) = comment.parent_id {
            let parent = self
                .comment_repo
                .find_by_id(parent_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Parent comment not found".to_string()))?;

            let input = NotifyInput {
                recipient_id: parent.author_id,
                actor_id: comment.author_id.clone(),
                notification_type: NotificationType::Reply,
                verb: "replied to your comment".to_string(),
                action_object: action_object.clone(),
                target: Some(EntityRef::comment(parent.id)),
            };
            created.extend(self.notify_in(conn, input).await?);
        } else if comment.target_kind == EntityKind::Post {
            let post = self
                .post_repo
                .find_by_id(&comment.target_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

            let input = NotifyInput {
                recipient_id: post.author_id,
                actor_id: comment.author_id.clone(),
                notification_type: NotificationType::Comment,
                verb: "commented on your post".to_string(),
                action_object: action_object.clone(),
                target: Some(comment.target_ref()),
            };
            created.extend(self.notify_in(conn, input).await?);
        }

        for mentioned in self.resolve_mentions(&comment.content, &comment.author_id).await? {
            let input = NotifyInput {
                recipient_id: mentioned.id,
                actor_id: comment.author_id.clone(),
                notification_type: NotificationType::Mention,
                verb: "mentioned you in a comment".to_string(),
                action_object: action_object.clone(),
                target: Some(comment.target_ref()),
            };
            created.extend(self.notify_in(conn, input).await?);
        }

        Ok(created)
    }

    /// A post was created: mention rule only.
    pub async fn handle_post_created_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        post: &status_post::Model,
    ) -> AppResult<Vec<notification::Model>> {
        let mut created = Vec::new();

        for mentioned in self.resolve_mentions(&post.content, &post.author_id).await? {
            let input = NotifyInput {
                recipient_id: mentioned.id,
                actor_id: post.author_id.clone(),
                notification_type: NotificationType::Mention,
                verb: "mentioned you in a post".to_string(),
                action_object: EntityRef::post(post.id.clone()),
                target: None,
            };
            created.extend(self.notify_in(conn, input).await?);
        }

        Ok(created)
    }

    /// Scan `@username` tokens and resolve them, dropping unknown names and
    /// the actor.
    async fn resolve_mentions(&self, text: &str, actor_id: &str) -> AppResult<Vec<user::Model>> {
        let mut seen = Vec::new();
        for capture in MENTION_RE.captures_iter(text) {
            let username = capture[1].to_lowercase();
            if !seen.contains(&username) {
                seen.push(username);
            }
        }

        let mut resolved = Vec::new();
        for username in &seen {
            if let Some(user) = self.directory.resolve(username).await?
                && user.id != actor_id
            {
                resolved.push(user);
            }
        }
        Ok(resolved)
    }

    // --- read path ---

    /// Notifications for a recipient, newest first.
    pub async fn list_for_user(
        &self,
        recipient_id: &str,
        limit: u64,
        until_id: Option<&str>,
        unread_only: bool,
    ) -> AppResult<Vec<notification::Model>> {
        self.notification_repo
            .find_by_user(recipient_id, limit, until_id, unread_only)
            .await
    }

    /// Mark one of the recipient's notifications as read.
    pub async fn mark_as_read(&self, recipient_id: &str, notification_id: &str) -> AppResult<()> {
        let notification = self
            .notification_repo
            .find_by_id(notification_id)
            .await?
            .filter(|n| n.recipient_id == recipient_id)
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

        self.notification_repo.mark_as_read(notification).await
    }

    /// Mark all of a recipient's notifications as read. Returns the count.
    pub async fn mark_all_as_read(&self, recipient_id: &str) -> AppResult<u64> {
        self.notification_repo.mark_all_as_read(recipient_id).await
    }

    /// Count unread notifications.
    pub async fn count_unread(&self, recipient_id: &str) -> AppResult<u64> {
        self.notification_repo.count_unread(recipient_id).await
    }

    // --- rendering and dispatch ---

    /// Render a notification into its wire payload.
    pub async fn render(&self, notification: &notification::Model) -> AppResult<NotificationView> {
        let actor = self
            .user_repo
            .find_by_id(&notification.actor_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound("Actor not found".to_string()))?;

        let action_object = self.resolve_ref(&notification.action_object_ref()).await?;
        let target = match notification.target_ref() {
            Some(ref target_ref) => Some(self.resolve_ref(target_ref).await?),
            None => None,
        };

        let context_snippet = match notification.notification_type {
            NotificationType::Comment | NotificationType::Reply | NotificationType::Mention => {
                action_object.display_text.as_deref().map(quote_snippet)
            }
            NotificationType::Like => target
                .as_ref()
                .and_then(|t| t.display_text.as_deref())
                .map(quote_snippet),
            NotificationType::Follow
            | NotificationType::GroupJoinRequest
            | NotificationType::GroupJoinApproved => None,
        };

        Ok(NotificationView {
            id: notification.id.clone(),
            actor: ActorView {
                id: actor.id.clone(),
                display_name: actor.display_name().to_string(),
            },
            verb: notification.verb.clone(),
            notification_type: notification.notification_type,
            action_object,
            target,
            timestamp: notification.created_at,
            is_read: notification.is_read,
            context_snippet,
        })
    }

    /// Render and publish freshly created notifications, best-effort.
    ///
    /// Called by producers after their transaction commits; a render or
    /// publish failure is logged and never surfaced.
    pub async fn dispatch_created(&self, notifications: &[notification::Model]) {
        let Some(ref dispatcher) = self.dispatcher else {
            return;
        };

        for notification in notifications {
            match self.render(notification).await {
                Ok(view) => {
                    dispatcher
                        .publish_notification(&notification.recipient_id, &view)
                        .await;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        notification_id = %notification.id,
                        "Failed to render notification for dispatch"
                    );
                }
            }
        }
    }

    /// Resolve a polymorphic reference for rendering. Each variant resolves
    /// explicitly; kinds with no text content render without display text.
    async fn resolve_ref(&self, entity_ref: &EntityRef) -> AppResult<RefView> {
        let display_text = match entity_ref.kind {
            EntityKind::Post => self
                .post_repo
                .find_by_id(&entity_ref.id)
                .await?
                .map(|p| p.content),
            EntityKind::Comment => self
                .comment_repo
                .find_by_id(&entity_ref.id)
                .await?
                .map(|c| c.content),
            EntityKind::Group => self
                .group_repo
                .find_by_id(&entity_ref.id)
                .await?
                .map(|g| g.name),
            EntityKind::User => self
                .user_repo
                .find_by_id(&entity_ref.id)
                .await?
                .map(|u| u.display_name().to_string()),
            EntityKind::Like
            | EntityKind::Follow
            | EntityKind::GroupJoinRequest
            | EntityKind::ConnectionRequest => None,
        };

        Ok(RefView {
            kind: entity_ref.kind,
            id: entity_ref.id.clone(),
            display_text,
        })
    }
}

/// Quote and truncate text for a context snippet.
fn quote_snippet(text: &str) -> String {
    let truncated: String = text.chars().take(SNIPPET_MAX_CHARS).collect();
    if truncated.len() < text.len() {
        format!("\"{truncated}…\"")
    } else {
        format!("\"{truncated}\"")
    }
}
