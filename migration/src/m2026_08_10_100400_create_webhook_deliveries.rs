//! Migration to create the webhook_deliveries table.
//!
//! The unique constraint on delivery_id is the idempotency gate for
//! inbound webhook processing. A second insert with the same delivery id
//! fails with a unique violation, which the ledger maps to "skip".

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WebhookDeliveries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WebhookDeliveries::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WebhookDeliveries::DeliveryId)
                            .text()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(WebhookDeliveries::RepoId).uuid().null())
                    .col(ColumnDef::new(WebhookDeliveries::Event).text().not_null())
                    .col(ColumnDef::new(WebhookDeliveries::Action).text().null())
                    .col(
                        ColumnDef::new(WebhookDeliveries::ReceivedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_webhook_deliveries_repo_id")
                            .from(WebhookDeliveries::Table, WebhookDeliveries::RepoId)
                            .to(Repos::Table, Repos::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_webhook_deliveries_repo_id")
                    .table(WebhookDeliveries::Table)
                    .col(WebhookDeliveries::RepoId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_webhook_deliveries_repo_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(WebhookDeliveries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum WebhookDeliveries {
    Table,
    Id,
    DeliveryId,
    RepoId,
    Event,
    Action,
    ReceivedAt,
}

#[derive(DeriveIden)]
enum Repos {
    Table,
    Id,
}
