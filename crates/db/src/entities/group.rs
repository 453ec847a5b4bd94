//! Group entity for user communities.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Group privacy level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    /// Anyone can join directly.
    #[sea_orm(string_value = "public")]
    Public,
    /// Joining requires a request approved by the creator.
    #[sea_orm(string_value = "private")]
    Private,
}

impl Default for PrivacyLevel {
    fn default() -> Self {
        Self::Public
    }
}

/// Group entity - a community users can join.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "group")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Group name.
    pub name: String,

    /// URL-safe identifier derived from the name plus a disambiguator.
    #[sea_orm(unique)]
    pub slug: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// The user who moderates the group. Always a member.
    #[sea_orm(indexed)]
    pub creator_id: String,

    pub privacy_level: PrivacyLevel,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatorId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Creator,

    #[sea_orm(has_many = "super::group_member::Entity")]
    Members,
}

impl ActiveModelBehavior for ActiveModel {}
