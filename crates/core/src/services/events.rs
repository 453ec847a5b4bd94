//! Domain events raised by the relationship and group services.
//!
//! Every successful state-machine mutation raises one of these. The
//! notification engine receives them synchronously, inside the mutation's
//! transaction, and decides which of them warrant a notification row.

use loopline_db::entities::{connection_request, follow, group, group_join_request, group_member};

/// A graph or group mutation that producers hand to the notification engine.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// A user started following another user.
    Followed { follow: follow::Model },
    /// A connection request was sent.
    ConnectionRequested { request: connection_request::Model },
    /// A connection request reached the accepted state, either explicitly or
    /// through the connection-first follow-back rule.
    ConnectionAccepted { request: connection_request::Model },
    /// A user became a member of a public group.
    GroupJoined {
        member: group_member::Model,
        group: group::Model,
    },
    /// A user asked to join a private group.
    GroupJoinRequested {
        request: group_join_request::Model,
        group: group::Model,
    },
    /// A join request was approved. The request row is already deleted; the
    /// model here is the last state it had.
    GroupJoinApproved {
        request: group_join_request::Model,
        group: group::Model,
        approved_by: String,
    },
}
