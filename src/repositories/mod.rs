//! # Repository Layer
//!
//! This module contains repository implementations that encapsulate SeaORM
//! operations for database entities, providing a clean API for data access.

pub mod cached_file;
pub mod comment;
pub mod delivery;
pub mod issue;
pub mod pull_request;
pub mod repo;
pub mod sync_log;

pub use cached_file::{CacheWriteOutcome, CachedFileRepository};
pub use comment::CommentRepository;
pub use delivery::DeliveryRepository;
pub use issue::IssueRepository;
pub use pull_request::PullRequestRepository;
pub use repo::RepoRepository;
pub use sync_log::SyncLogRepository;

#[cfg(test)]
pub(crate) mod test_support {
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
    use uuid::Uuid;

    use crate::models::repo;

    pub async fn setup_db() -> DatabaseConnection {
        let db = sea_orm::Database::connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");
        db
    }

    pub async fn insert_repo(db: &DatabaseConnection, remote_id: i64) -> repo::Model {
        let now = chrono::Utc::now();
        let model = repo::ActiveModel {
            id: Set(Uuid::new_v4()),
            remote_id: Set(remote_id),
            owner: Set("octocat".to_string()),
            name: Set(format!("demo-{}", remote_id)),
            default_branch: Set("main".to_string()),
            sync_enabled: Set(true),
            sync_status: Set(repo::SYNC_STATUS_IDLE.to_string()),
            last_synced_at: Set(None),
            webhook_id: Set(None),
            webhook_secret: Set(Some("s3cret".to_string())),
            access_token: Set(Some("t0ken".to_string())),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        model.insert(db).await.expect("Failed to insert test repo")
    }
}
