//! Migration to create the cached_files table.
//!
//! One row per (repo, path). The stored content hash gates overwrites so
//! that unchanged files only get a freshness timestamp touch.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CachedFiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CachedFiles::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CachedFiles::RepoId).uuid().not_null())
                    .col(ColumnDef::new(CachedFiles::Path).text().not_null())
                    .col(ColumnDef::new(CachedFiles::ContentHash).text().not_null())
                    .col(ColumnDef::new(CachedFiles::Content).binary().not_null())
                    .col(ColumnDef::new(CachedFiles::Size).big_integer().not_null())
                    .col(
                        ColumnDef::new(CachedFiles::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CachedFiles::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cached_files_repo_id")
                            .from(CachedFiles::Table, CachedFiles::RepoId)
                            .to(Repos::Table, Repos::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_cached_files_repo_path")
                    .table(CachedFiles::Table)
                    .col(CachedFiles::RepoId)
                    .col(CachedFiles::Path)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("uq_cached_files_repo_path").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(CachedFiles::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CachedFiles {
    Table,
    Id,
    RepoId,
    Path,
    ContentHash,
    Content,
    Size,
    LastSyncedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Repos {
    Table,
    Id,
}
