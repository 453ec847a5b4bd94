//! Notification entity.
//!
//! A notification records that an actor did something a recipient should hear
//! about. `(recipient_id, actor_id, action_object_kind, action_object_id)` is
//! unique so the same action never notifies twice.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::entity_ref::{EntityKind, EntityRef};

/// What kind of action produced a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// Someone liked the recipient's post or comment.
    #[sea_orm(string_value = "like")]
    Like,
    /// Someone commented on the recipient's post.
    #[sea_orm(string_value = "comment")]
    Comment,
    /// Someone replied to the recipient's comment.
    #[sea_orm(string_value = "reply")]
    Reply,
    /// Someone mentioned the recipient by username.
    #[sea_orm(string_value = "mention")]
    Mention,
    /// Someone started following the recipient.
    #[sea_orm(string_value = "follow")]
    Follow,
    /// Someone asked to join a group the recipient created.
    #[sea_orm(string_value = "group_join_request")]
    GroupJoinRequest,
    /// The recipient's request to join a group was approved.
    #[sea_orm(string_value = "group_join_approved")]
    GroupJoinApproved,
}

impl NotificationType {
    /// Wire-format string for this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Reply => "reply",
            Self::Mention => "mention",
            Self::Follow => "follow",
            Self::GroupJoinRequest => "group_join_request",
            Self::GroupJoinApproved => "group_join_approved",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Who receives the notification.
    #[sea_orm(indexed)]
    pub recipient_id: String,

    /// Who performed the action.
    pub actor_id: String,

    pub notification_type: NotificationType,

    /// Human-readable verb, e.g. "liked your post".
    pub verb: String,

    /// The object the actor acted with (a like row, a comment, a follow edge).
    pub action_object_kind: EntityKind,
    pub action_object_id: String,

    /// The object the action landed on (the liked post, the group).
    #[sea_orm(nullable)]
    pub target_kind: Option<EntityKind>,
    #[sea_orm(nullable)]
    pub target_id: Option<String>,

    pub is_read: bool,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Reference to the action object.
    #[must_use]
    pub fn action_object_ref(&self) -> EntityRef {
        EntityRef::new(self.action_object_kind, self.action_object_id.clone())
    }

    /// Reference to the target, when one was recorded.
    #[must_use]
    pub fn target_ref(&self) -> Option<EntityRef> {
        match (self.target_kind, &self.target_id) {
            (Some(kind), Some(id)) => Some(EntityRef::new(kind, id.clone())),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::RecipientId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Recipient,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ActorId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Actor,
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_type_as_str_matches_serde() {
        for ty in [
            NotificationType::Like,
            NotificationType::Comment,
            NotificationType::Reply,
            NotificationType::Mention,
            NotificationType::Follow,
            NotificationType::GroupJoinRequest,
            NotificationType::GroupJoinApproved,
        ] {
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{}\"", ty.as_str()));
        }
    }

    #[test]
    fn test_target_ref_requires_both_columns() {
        let model = Model {
            id: "n1".into(),
            recipient_id: "u1".into(),
            actor_id: "u2".into(),
            notification_type: NotificationType::Follow,
            verb: "started following you".into(),
            action_object_kind: EntityKind::Follow,
            action_object_id: "f1".into(),
            target_kind: None,
            target_id: None,
            is_read: false,
            created_at: chrono::Utc::now().into(),
        };
        assert!(model.target_ref().is_none());
    }
}
