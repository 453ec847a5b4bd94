//! Create connection request table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ConnectionRequest::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConnectionRequest::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ConnectionRequest::SenderId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConnectionRequest::ReceiverId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConnectionRequest::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(ConnectionRequest::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(ConnectionRequest::RespondedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_connection_request_sender")
                            .from(ConnectionRequest::Table, ConnectionRequest::SenderId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_connection_request_receiver")
                            .from(ConnectionRequest::Table, ConnectionRequest::ReceiverId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (sender_id, receiver_id) - one request per directed
        // pair, regardless of status
        manager
            .create_index(
                Index::create()
                    .name("idx_connection_request_sender_receiver")
                    .table(ConnectionRequest::Table)
                    .col(ConnectionRequest::SenderId)
                    .col(ConnectionRequest::ReceiverId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: receiver_id (for listing incoming requests)
        manager
            .create_index(
                Index::create()
                    .name("idx_connection_request_receiver_id")
                    .table(ConnectionRequest::Table)
                    .col(ConnectionRequest::ReceiverId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConnectionRequest::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ConnectionRequest {
    Table,
    Id,
    SenderId,
    ReceiverId,
    Status,
    CreatedAt,
    RespondedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
