//! Polymorphic entity references.
//!
//! A tagged `(kind, id)` pair that can address any notifiable domain entity.
//! Used by comments, likes, and notifications instead of per-type foreign
//! keys, with a closed set of kinds so resolution is an explicit match.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The closed set of entity kinds a [`EntityRef`] may address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "post")]
    Post,
    #[sea_orm(string_value = "comment")]
    Comment,
    #[sea_orm(string_value = "like")]
    Like,
    #[sea_orm(string_value = "follow")]
    Follow,
    #[sea_orm(string_value = "group")]
    Group,
    #[sea_orm(string_value = "group_join_request")]
    GroupJoinRequest,
    #[sea_orm(string_value = "connection_request")]
    ConnectionRequest,
}

impl EntityKind {
    /// Stable lowercase name, matching the database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Post => "post",
            Self::Comment => "comment",
            Self::Like => "like",
            Self::Follow => "follow",
            Self::Group => "group",
            Self::GroupJoinRequest => "group_join_request",
            Self::ConnectionRequest => "connection_request",
        }
    }
}

/// A reference to any addressable domain entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// What table the id points into.
    pub kind: EntityKind,
    /// The referenced row id.
    pub id: String,
}

impl EntityRef {
    /// Create a reference.
    #[must_use]
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Reference a status post.
    #[must_use]
    pub fn post(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Post, id)
    }

    /// Reference a comment.
    #[must_use]
    pub fn comment(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Comment, id)
    }

    /// Reference a group.
    #[must_use]
    pub fn group(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Group, id)
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_string() {
        for kind in [
            EntityKind::Post,
            EntityKind::Comment,
            EntityKind::GroupJoinRequest,
        ] {
            let json = serde_json::to_string(&kind).unwrap_or_default();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_display() {
        let r = EntityRef::post("01abc");
        assert_eq!(r.to_string(), "post:01abc");
    }
}
