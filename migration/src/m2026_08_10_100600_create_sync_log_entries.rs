//! Migration to create the sync_log_entries table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncLogEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncLogEntries::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncLogEntries::RepoId).uuid().null())
                    .col(
                        ColumnDef::new(SyncLogEntries::EventType)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyncLogEntries::Direction)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyncLogEntries::Success)
                            .boolean()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SyncLogEntries::Error).text().null())
                    .col(ColumnDef::new(SyncLogEntries::Payload).json_binary().null())
                    .col(
                        ColumnDef::new(SyncLogEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sync_log_entries_repo_id")
                            .from(SyncLogEntries::Table, SyncLogEntries::RepoId)
                            .to(Repos::Table, Repos::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Audit queries read newest entries for a repo first.
        manager
            .create_index(
                Index::create()
                    .name("idx_sync_log_entries_repo_created")
                    .table(SyncLogEntries::Table)
                    .col(SyncLogEntries::RepoId)
                    .col(SyncLogEntries::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_sync_log_entries_repo_created")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(SyncLogEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SyncLogEntries {
    Table,
    Id,
    RepoId,
    EventType,
    Direction,
    Success,
    Error,
    Payload,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Repos {
    Table,
    Id,
}
