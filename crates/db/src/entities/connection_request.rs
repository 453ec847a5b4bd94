//! Connection request entity.
//!
//! "Connected" itself is derived, not stored: two users are connected iff
//! follow edges exist in both directions and a request between them is
//! `Accepted`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of a connection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Awaiting a response from the receiver.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Accepted, either explicitly or by a follow-back.
    #[sea_orm(string_value = "accepted")]
    Accepted,
    /// Rejected explicitly, or the connection was later broken by unfollow.
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "connection_request")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The user who asked for the connection.
    pub sender_id: String,

    /// The user being asked.
    pub receiver_id: String,

    pub status: ConnectionStatus,

    pub created_at: DateTimeWithTimeZone,

    /// When the request left the pending state.
    #[sea_orm(nullable)]
    pub responded_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::SenderId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Sender,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ReceiverId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Receiver,
}

impl ActiveModelBehavior for ActiveModel {}
