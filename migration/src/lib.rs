//! Database migrations for the RepoMirror sync engine.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_08_10_100000_create_repos;
mod m2026_08_10_100100_create_issues;
mod m2026_08_10_100200_create_pull_requests;
mod m2026_08_10_100300_create_comments;
mod m2026_08_10_100400_create_webhook_deliveries;
mod m2026_08_10_100500_create_cached_files;
mod m2026_08_10_100600_create_sync_log_entries;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_08_10_100000_create_repos::Migration),
            Box::new(m2026_08_10_100100_create_issues::Migration),
            Box::new(m2026_08_10_100200_create_pull_requests::Migration),
            Box::new(m2026_08_10_100300_create_comments::Migration),
            Box::new(m2026_08_10_100400_create_webhook_deliveries::Migration),
            Box::new(m2026_08_10_100500_create_cached_files::Migration),
            Box::new(m2026_08_10_100600_create_sync_log_entries::Migration),
        ]
    }
}
