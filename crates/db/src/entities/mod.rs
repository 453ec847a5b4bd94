//! `SeaORM` entity definitions.

pub mod comment;
pub mod connection_request;
pub mod entity_ref;
pub mod follow;
pub mod group;
pub mod group_block;
pub mod group_join_request;
pub mod group_member;
pub mod like;
pub mod notification;
pub mod status_post;
pub mod user;

pub use comment::Entity as Comment;
pub use connection_request::Entity as ConnectionRequest;
pub use entity_ref::{EntityKind, EntityRef};
pub use follow::Entity as Follow;
pub use group::Entity as Group;
pub use group_block::Entity as GroupBlock;
pub use group_join_request::Entity as GroupJoinRequest;
pub use group_member::Entity as GroupMember;
pub use like::Entity as Like;
pub use notification::Entity as Notification;
pub use status_post::Entity as StatusPost;
pub use user::Entity as User;
