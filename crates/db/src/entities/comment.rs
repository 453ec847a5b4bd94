//! Comment entity.
//!
//! Comments attach to any commentable entity through a polymorphic
//! `(target_kind, target_id)` pair; replies additionally carry `parent_id`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::entity_ref::{EntityKind, EntityRef};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "comment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub author_id: String,

    /// Kind of the commented-on object.
    pub target_kind: EntityKind,

    /// Id of the commented-on object.
    pub target_id: String,

    /// Parent comment when this is a reply.
    #[sea_orm(nullable)]
    pub parent_id: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Reference to the commented-on object.
    #[must_use]
    pub fn target_ref(&self) -> EntityRef {
        EntityRef::new(self.target_kind, self.target_id.clone())
    }

    /// Whether this comment is a reply to another comment.
    #[must_use]
    pub const fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Author,

    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id",
        on_delete = "Cascade"
    )]
    Parent,
}

impl ActiveModelBehavior for ActiveModel {}
