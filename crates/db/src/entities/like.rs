//! Like entity.
//!
//! One row per `(user_id, target_kind, target_id)` triple; the unique index on
//! that triple makes repeated likes a constraint violation rather than a
//! duplicate row.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::entity_ref::{EntityKind, EntityRef};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "like")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: String,

    /// Kind of the liked object.
    pub target_kind: EntityKind,

    /// Id of the liked object.
    pub target_id: String,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Reference to the liked object.
    #[must_use]
    pub fn target_ref(&self) -> EntityRef {
        EntityRef::new(self.target_kind, self.target_id.clone())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl ActiveModelBehavior for ActiveModel {}
