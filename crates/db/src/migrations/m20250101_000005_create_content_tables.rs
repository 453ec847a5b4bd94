//! Create content tables migration.
//!
//! Status posts, comments, and likes. Comments and likes point at their
//! target polymorphically, so the target columns carry no foreign keys.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StatusPost::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StatusPost::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StatusPost::AuthorId).string_len(32).not_null())
                    .col(ColumnDef::new(StatusPost::Content).text().not_null())
                    .col(
                        ColumnDef::new(StatusPost::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(StatusPost::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_status_post_author")
                            .from(StatusPost::Table, StatusPost::AuthorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: author_id (for author timelines)
        manager
            .create_index(
                Index::create()
                    .name("idx_status_post_author_id")
                    .table(StatusPost::Table)
                    .col(StatusPost::AuthorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Comment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Comment::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Comment::AuthorId).string_len(32).not_null())
                    .col(ColumnDef::new(Comment::TargetKind).string_len(32).not_null())
                    .col(ColumnDef::new(Comment::TargetId).string_len(32).not_null())
                    .col(ColumnDef::new(Comment::ParentId).string_len(32))
                    .col(ColumnDef::new(Comment::Content).text().not_null())
                    .col(
                        ColumnDef::new(Comment::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Comment::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comment_author")
                            .from(Comment::Table, Comment::AuthorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comment_parent")
                            .from(Comment::Table, Comment::ParentId)
                            .to(Comment::Table, Comment::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (target_kind, target_id) (for listing comments on a target)
        manager
            .create_index(
                Index::create()
                    .name("idx_comment_target")
                    .table(Comment::Table)
                    .col(Comment::TargetKind)
                    .col(Comment::TargetId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Like::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Like::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Like::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Like::TargetKind).string_len(32).not_null())
                    .col(ColumnDef::new(Like::TargetId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Like::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_like_user")
                            .from(Like::Table, Like::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (user_id, target_kind, target_id) - one like per target
        manager
            .create_index(
                Index::create()
                    .name("idx_like_user_target")
                    .table(Like::Table)
                    .col(Like::UserId)
                    .col(Like::TargetKind)
                    .col(Like::TargetId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: (target_kind, target_id) (for like counts)
        manager
            .create_index(
                Index::create()
                    .name("idx_like_target")
                    .table(Like::Table)
                    .col(Like::TargetKind)
                    .col(Like::TargetId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Like::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Comment::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StatusPost::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum StatusPost {
    Table,
    Id,
    AuthorId,
    Content,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Comment {
    Table,
    Id,
    AuthorId,
    TargetKind,
    TargetId,
    ParentId,
    Content,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Like {
    Table,
    Id,
    UserId,
    TargetKind,
    TargetId,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
