//! Migration to create the issues table.
//!
//! Local issue mirrors carry an optional remote identity triple so that
//! records created locally before their first push can exist without one.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Issues::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Issues::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Issues::RepoId).uuid().not_null())
                    .col(ColumnDef::new(Issues::Title).text().not_null())
                    .col(ColumnDef::new(Issues::Body).text().null())
                    .col(
                        ColumnDef::new(Issues::Status)
                            .text()
                            .not_null()
                            .default("backlog"),
                    )
                    .col(ColumnDef::new(Issues::Author).text().not_null())
                    .col(
                        ColumnDef::new(Issues::Labels)
                            .json_binary()
                            .not_null()
                            .default("[]"),
                    )
                    .col(ColumnDef::new(Issues::RemoteId).big_integer().null())
                    .col(ColumnDef::new(Issues::RemoteNodeId).text().null())
                    .col(ColumnDef::new(Issues::RemoteUrl).text().null())
                    .col(
                        ColumnDef::new(Issues::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Issues::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Issues::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_issues_repo_id")
                            .from(Issues::Table, Issues::RepoId)
                            .to(Repos::Table, Repos::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Remote-keyed upserts look records up by (repo_id, remote_id).
        manager
            .create_index(
                Index::create()
                    .name("idx_issues_repo_remote")
                    .table(Issues::Table)
                    .col(Issues::RepoId)
                    .col(Issues::RemoteId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_issues_repo_remote").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Issues::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Issues {
    Table,
    Id,
    RepoId,
    Title,
    Body,
    Status,
    Author,
    Labels,
    RemoteId,
    RemoteNodeId,
    RemoteUrl,
    LastSyncedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Repos {
    Table,
    Id,
}
