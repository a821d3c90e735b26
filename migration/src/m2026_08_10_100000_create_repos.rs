//! Migration to create the repos table.
//!
//! This migration creates the baseline repos table holding the identity of
//! each mirrored repository along with its sync flags and webhook secret.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Repos::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Repos::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Repos::RemoteId)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Repos::Owner).text().not_null())
                    .col(ColumnDef::new(Repos::Name).text().not_null())
                    .col(
                        ColumnDef::new(Repos::DefaultBranch)
                            .text()
                            .not_null()
                            .default("main"),
                    )
                    .col(
                        ColumnDef::new(Repos::SyncEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Repos::SyncStatus)
                            .text()
                            .not_null()
                            .default("idle"),
                    )
                    .col(
                        ColumnDef::new(Repos::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Repos::WebhookId).big_integer().null())
                    .col(ColumnDef::new(Repos::WebhookSecret).text().null())
                    .col(ColumnDef::new(Repos::AccessToken).text().null())
                    .col(
                        ColumnDef::new(Repos::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Repos::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_repos_owner_name")
                    .table(Repos::Table)
                    .col(Repos::Owner)
                    .col(Repos::Name)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_repos_owner_name").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Repos::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Repos {
    Table,
    Id,
    RemoteId,
    Owner,
    Name,
    DefaultBranch,
    SyncEnabled,
    SyncStatus,
    LastSyncedAt,
    WebhookId,
    WebhookSecret,
    AccessToken,
    CreatedAt,
    UpdatedAt,
}
