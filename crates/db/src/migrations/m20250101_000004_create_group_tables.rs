//! Create group tables migration.
//!
//! Creates the group table and its satellites: members, join requests, and
//! the block list.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Group::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Group::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Group::Name).string_len(128).not_null())
                    .col(ColumnDef::new(Group::Slug).string_len(160).not_null())
                    .col(ColumnDef::new(Group::Description).text())
                    .col(ColumnDef::new(Group::CreatorId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Group::PrivacyLevel)
                            .string_len(16)
                            .not_null()
                            .default("public"),
                    )
                    .col(
                        ColumnDef::new(Group::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Group::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_creator")
                            .from(Group::Table, Group::CreatorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: slug
        manager
            .create_index(
                Index::create()
                    .name("idx_group_slug")
                    .table(Group::Table)
                    .col(Group::Slug)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GroupMember::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupMember::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GroupMember::GroupId).string_len(32).not_null())
                    .col(ColumnDef::new(GroupMember::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(GroupMember::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_member_group")
                            .from(GroupMember::Table, GroupMember::GroupId)
                            .to(Group::Table, Group::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_member_user")
                            .from(GroupMember::Table, GroupMember::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (group_id, user_id) - prevent double membership
        manager
            .create_index(
                Index::create()
                    .name("idx_group_member_group_user")
                    .table(GroupMember::Table)
                    .col(GroupMember::GroupId)
                    .col(GroupMember::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: user_id (for listing a user's groups)
        manager
            .create_index(
                Index::create()
                    .name("idx_group_member_user_id")
                    .table(GroupMember::Table)
                    .col(GroupMember::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GroupJoinRequest::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupJoinRequest::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(GroupJoinRequest::GroupId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GroupJoinRequest::UserId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GroupJoinRequest::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_join_request_group")
                            .from(GroupJoinRequest::Table, GroupJoinRequest::GroupId)
                            .to(Group::Table, Group::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_join_request_user")
                            .from(GroupJoinRequest::Table, GroupJoinRequest::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (group_id, user_id) - requests are deleted when
        // resolved, so this enforces at most one pending request
        manager
            .create_index(
                Index::create()
                    .name("idx_group_join_request_group_user")
                    .table(GroupJoinRequest::Table)
                    .col(GroupJoinRequest::GroupId)
                    .col(GroupJoinRequest::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GroupBlock::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupBlock::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GroupBlock::GroupId).string_len(32).not_null())
                    .col(ColumnDef::new(GroupBlock::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(GroupBlock::BlockedBy).string_len(32).not_null())
                    .col(
                        ColumnDef::new(GroupBlock::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_block_group")
                            .from(GroupBlock::Table, GroupBlock::GroupId)
                            .to(Group::Table, Group::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_block_user")
                            .from(GroupBlock::Table, GroupBlock::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (group_id, user_id) - one block per user per group
        manager
            .create_index(
                Index::create()
                    .name("idx_group_block_group_user")
                    .table(GroupBlock::Table)
                    .col(GroupBlock::GroupId)
                    .col(GroupBlock::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GroupBlock::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GroupJoinRequest::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GroupMember::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Group::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Group {
    Table,
    Id,
    Name,
    Slug,
    Description,
    CreatorId,
    PrivacyLevel,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum GroupMember {
    Table,
    Id,
    GroupId,
    UserId,
    JoinedAt,
}

#[derive(Iden)]
enum GroupJoinRequest {
    Table,
    Id,
    GroupId,
    UserId,
    CreatedAt,
}

#[derive(Iden)]
enum GroupBlock {
    Table,
    Id,
    GroupId,
    UserId,
    BlockedBy,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
