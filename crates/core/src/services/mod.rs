//! Service layer.

pub mod content;
pub mod events;
pub mod group;
pub mod notification;
pub mod realtime;
pub mod relationship;

pub use content::{ContentService, CreateCommentInput, CreatePostInput};
pub use events::DomainEvent;
pub use group::{CreateGroupInput, GroupService, JoinOutcome, JoinRequestAction};
pub use notification::{
    ActorView, NotificationService, NotificationView, NotifyInput, RefView, UserDirectory,
};
pub use realtime::{topics, Envelope, EnvelopeMessage, NoOpPubSub, PubSub, RealtimeDispatcher, SharedPubSub};
pub use relationship::{
    ConnectionRequestAction, ConnectionState, FollowStatus, RelationshipService,
    RelationshipStatus,
};
