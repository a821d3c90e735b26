//! # Pull Request Repository
//!
//! Data access for mirrored pull requests, keyed by (repo_id, remote_id)
//! for remote-driven upserts.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::models::pull_request::{ActiveModel, Column, Entity as PullRequest, Model};
use crate::provider::types::RemotePull;

/// Repository for pull request database operations
pub struct PullRequestRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> PullRequestRepository<'a> {
    /// Create a new PullRequestRepository with the given database connection
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Model>, sea_orm::DbErr> {
        PullRequest::find_by_id(id).one(self.db).await
    }

    pub async fn find_by_remote(
        &self,
        repo_id: Uuid,
        remote_id: i64,
    ) -> Result<Option<Model>, sea_orm::DbErr> {
        PullRequest::find()
            .filter(Column::RepoId.eq(repo_id))
            .filter(Column::RemoteId.eq(remote_id))
            .one(self.db)
            .await
    }

    /// Count mirrored pull requests for a repository.
    pub async fn count_for_repo(&self, repo_id: Uuid) -> Result<u64, sea_orm::DbErr> {
        use sea_orm::PaginatorTrait;
        PullRequest::find()
            .filter(Column::RepoId.eq(repo_id))
            .count(self.db)
            .await
    }

    /// Insert or update the local mirror of a remote pull request. Status
    /// is derived from the remote state with merged taking precedence.
    pub async fn upsert_remote(
        &self,
        repo_id: Uuid,
        remote: &RemotePull,
    ) -> Result<Model, sea_orm::DbErr> {
        let now = Utc::now();
        let status = remote.local_status();

        match self.find_by_remote(repo_id, remote.number).await? {
            Some(existing) => {
                let mut active: ActiveModel = existing.into();
                active.title = Set(remote.title.clone());
                active.body = Set(remote.body.clone());
                active.status = Set(status.to_string());
                active.head_branch = Set(remote.head.git_ref.clone());
                active.base_branch = Set(remote.base.git_ref.clone());
                active.remote_node_id = Set(Some(remote.node_id.clone()));
                active.remote_url = Set(Some(remote.html_url.clone()));
                active.last_synced_at = Set(Some(now.into()));
                active.updated_at = Set(now.into());
                active.update(self.db).await
            }
            None => {
                let active = ActiveModel {
                    id: Set(Uuid::new_v4()),
                    repo_id: Set(repo_id),
                    title: Set(remote.title.clone()),
                    body: Set(remote.body.clone()),
                    status: Set(status.to_string()),
                    head_branch: Set(remote.head.git_ref.clone()),
                    base_branch: Set(remote.base.git_ref.clone()),
                    remote_id: Set(Some(remote.number)),
                    remote_node_id: Set(Some(remote.node_id.clone())),
                    remote_url: Set(Some(remote.html_url.clone())),
                    last_synced_at: Set(Some(now.into())),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                };
                active.insert(self.db).await
            }
        }
    }

    /// Fill in the remote identity triple after an outbound create.
    pub async fn set_remote_identity(
        &self,
        id: Uuid,
        remote_id: i64,
        remote_node_id: &str,
        remote_url: &str,
    ) -> Result<Model, sea_orm::DbErr> {
        let existing = PullRequest::find_by_id(id)
            .one(self.db)
            .await?
            .ok_or_else(|| sea_orm::DbErr::RecordNotFound(format!("pull request {}", id)))?;

        let now = Utc::now();
        let mut active: ActiveModel = existing.into();
        active.remote_id = Set(Some(remote_id));
        active.remote_node_id = Set(Some(remote_node_id.to_string()));
        active.remote_url = Set(Some(remote_url.to_string()));
        active.last_synced_at = Set(Some(now.into()));
        active.updated_at = Set(now.into());
        active.update(self.db).await
    }
}
