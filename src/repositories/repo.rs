//! # Repo Repository
//!
//! Data access for mirrored repositories, including the sync state
//! tracker. The `syncing` status doubles as an advisory lock: claiming it
//! is a conditional update so concurrent full syncs cannot both win.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::models::repo::{
    ActiveModel, Column, Entity as Repo, Model, SYNC_STATUS_ERROR, SYNC_STATUS_IDLE,
    SYNC_STATUS_SYNCING,
};
use crate::provider::types::RemoteRepo;

/// Repository for repo database operations
pub struct RepoRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> RepoRepository<'a> {
    /// Create a new RepoRepository with the given database connection
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Link a remote repository, storing its credential and the generated
    /// webhook secret.
    pub async fn create(
        &self,
        remote: &RemoteRepo,
        access_token: Option<String>,
        webhook_secret: Option<String>,
    ) -> Result<Model, sea_orm::DbErr> {
        let now = Utc::now();
        let model = ActiveModel {
            id: Set(Uuid::new_v4()),
            remote_id: Set(remote.id),
            owner: Set(remote.owner.login.clone()),
            name: Set(remote.name.clone()),
            default_branch: Set(remote.default_branch.clone()),
            sync_enabled: Set(true),
            sync_status: Set(SYNC_STATUS_IDLE.to_string()),
            last_synced_at: Set(None),
            webhook_id: Set(None),
            webhook_secret: Set(webhook_secret),
            access_token: Set(access_token),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        model.insert(self.db).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Model>, sea_orm::DbErr> {
        Repo::find_by_id(id).one(self.db).await
    }

    /// Look up a repository by the provider-side id carried in webhook
    /// payloads.
    pub async fn find_by_remote_id(&self, remote_id: i64) -> Result<Option<Model>, sea_orm::DbErr> {
        Repo::find()
            .filter(Column::RemoteId.eq(remote_id))
            .one(self.db)
            .await
    }

    /// Store the provider-side webhook id after registration.
    pub async fn set_webhook_id(&self, id: Uuid, webhook_id: i64) -> Result<(), sea_orm::DbErr> {
        Repo::update_many()
            .col_expr(Column::WebhookId, Expr::value(Some(webhook_id)))
            .col_expr(Column::UpdatedAt, Expr::value(now_tz()))
            .filter(Column::Id.eq(id))
            .exec(self.db)
            .await?;
        Ok(())
    }

    /// Claim the syncing status. Returns false when another sync already
    /// holds it; only idle and error repositories can be claimed.
    pub async fn begin_sync(&self, id: Uuid) -> Result<bool, sea_orm::DbErr> {
        let result = Repo::update_many()
            .col_expr(Column::SyncStatus, Expr::value(SYNC_STATUS_SYNCING))
            .col_expr(Column::UpdatedAt, Expr::value(now_tz()))
            .filter(Column::Id.eq(id))
            .filter(Column::SyncStatus.is_in([SYNC_STATUS_IDLE, SYNC_STATUS_ERROR]))
            .exec(self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Release the syncing status after a successful run and stamp the
    /// last synced time.
    pub async fn finish_sync(&self, id: Uuid) -> Result<(), sea_orm::DbErr> {
        Repo::update_many()
            .col_expr(Column::SyncStatus, Expr::value(SYNC_STATUS_IDLE))
            .col_expr(Column::LastSyncedAt, Expr::value(Some(now_tz())))
            .col_expr(Column::UpdatedAt, Expr::value(now_tz()))
            .filter(Column::Id.eq(id))
            .exec(self.db)
            .await?;
        Ok(())
    }

    /// Mark the repository as failed; a later sync may claim it again.
    pub async fn fail_sync(&self, id: Uuid) -> Result<(), sea_orm::DbErr> {
        Repo::update_many()
            .col_expr(Column::SyncStatus, Expr::value(SYNC_STATUS_ERROR))
            .col_expr(Column::UpdatedAt, Expr::value(now_tz()))
            .filter(Column::Id.eq(id))
            .exec(self.db)
            .await?;
        Ok(())
    }
}

fn now_tz() -> sea_orm::prelude::DateTimeWithTimeZone {
    Utc::now().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support::{insert_repo, setup_db};

    #[tokio::test]
    async fn test_begin_sync_claims_idle_repo() {
        let db = setup_db().await;
        let repo = insert_repo(&db, 1001).await;
        let repos = RepoRepository::new(&db);

        assert!(repos.begin_sync(repo.id).await.unwrap());

        let reloaded = repos.find_by_id(repo.id).await.unwrap().unwrap();
        assert_eq!(reloaded.sync_status, SYNC_STATUS_SYNCING);
    }

    #[tokio::test]
    async fn test_begin_sync_rejects_concurrent_claim() {
        let db = setup_db().await;
        let repo = insert_repo(&db, 1002).await;
        let repos = RepoRepository::new(&db);

        assert!(repos.begin_sync(repo.id).await.unwrap());
        // Second claim loses while the first still holds the status.
        assert!(!repos.begin_sync(repo.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_begin_sync_reclaims_after_error() {
        let db = setup_db().await;
        let repo = insert_repo(&db, 1003).await;
        let repos = RepoRepository::new(&db);

        assert!(repos.begin_sync(repo.id).await.unwrap());
        repos.fail_sync(repo.id).await.unwrap();

        assert!(repos.begin_sync(repo.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_finish_sync_stamps_last_synced_at() {
        let db = setup_db().await;
        let repo = insert_repo(&db, 1004).await;
        let repos = RepoRepository::new(&db);

        repos.begin_sync(repo.id).await.unwrap();
        repos.finish_sync(repo.id).await.unwrap();

        let reloaded = repos.find_by_id(repo.id).await.unwrap().unwrap();
        assert_eq!(reloaded.sync_status, SYNC_STATUS_IDLE);
        assert!(reloaded.last_synced_at.is_some());
    }

    #[tokio::test]
    async fn test_find_by_remote_id() {
        let db = setup_db().await;
        let repo = insert_repo(&db, 4242).await;
        let repos = RepoRepository::new(&db);

        let found = repos.find_by_remote_id(4242).await.unwrap().unwrap();
        assert_eq!(found.id, repo.id);

        assert!(repos.find_by_remote_id(9999).await.unwrap().is_none());
    }
}
