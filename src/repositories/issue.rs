//! # Issue Repository
//!
//! Data access for mirrored issues. Remote-keyed upserts look records up
//! by (repo_id, remote_id) so webhook redeliveries and full sync converge
//! on the same row.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde_json::json;
use uuid::Uuid;

use crate::models::issue::{ActiveModel, Column, Entity as Issue, Model};
use crate::provider::types::RemoteIssue;

/// Repository for issue database operations
pub struct IssueRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> IssueRepository<'a> {
    /// Create a new IssueRepository with the given database connection
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Model>, sea_orm::DbErr> {
        Issue::find_by_id(id).one(self.db).await
    }

    pub async fn find_by_remote(
        &self,
        repo_id: Uuid,
        remote_id: i64,
    ) -> Result<Option<Model>, sea_orm::DbErr> {
        Issue::find()
            .filter(Column::RepoId.eq(repo_id))
            .filter(Column::RemoteId.eq(remote_id))
            .one(self.db)
            .await
    }

    /// Count mirrored issues for a repository.
    pub async fn count_for_repo(&self, repo_id: Uuid) -> Result<u64, sea_orm::DbErr> {
        use sea_orm::PaginatorTrait;
        Issue::find()
            .filter(Column::RepoId.eq(repo_id))
            .count(self.db)
            .await
    }

    /// Insert or update the local mirror of a remote issue. The caller
    /// supplies the already-mapped local status.
    pub async fn upsert_remote(
        &self,
        repo_id: Uuid,
        remote: &RemoteIssue,
        status: &str,
    ) -> Result<Model, sea_orm::DbErr> {
        let now = Utc::now();
        let labels = json!(
            remote
                .labels
                .iter()
                .map(|l| l.name.clone())
                .collect::<Vec<_>>()
        );

        match self.find_by_remote(repo_id, remote.number).await? {
            Some(existing) => {
                let mut active: ActiveModel = existing.into();
                active.title = Set(remote.title.clone());
                active.body = Set(remote.body.clone());
                active.status = Set(status.to_string());
                active.author = Set(remote.user.login.clone());
                active.labels = Set(labels);
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
                    author: Set(remote.user.login.clone()),
                    labels: Set(labels),
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

    /// Fill in the remote identity triple after an outbound create and
    /// stamp the record synced.
    pub async fn set_remote_identity(
        &self,
        id: Uuid,
        remote_id: i64,
        remote_node_id: &str,
        remote_url: &str,
    ) -> Result<Model, sea_orm::DbErr> {
        let existing = Issue::find_by_id(id)
            .one(self.db)
            .await?
            .ok_or_else(|| sea_orm::DbErr::RecordNotFound(format!("issue {}", id)))?;

        let now = Utc::now();
        let mut active: ActiveModel = existing.into();
        active.remote_id = Set(Some(remote_id));
        active.remote_node_id = Set(Some(remote_node_id.to_string()));
        active.remote_url = Set(Some(remote_url.to_string()));
        active.last_synced_at = Set(Some(now.into()));
        active.updated_at = Set(now.into());
        active.update(self.db).await
    }

    /// Stamp the record synced after a successful outbound update.
    pub async fn mark_synced(&self, id: Uuid) -> Result<(), sea_orm::DbErr> {
        let existing = Issue::find_by_id(id)
            .one(self.db)
            .await?
            .ok_or_else(|| sea_orm::DbErr::RecordNotFound(format!("issue {}", id)))?;

        let now = Utc::now();
        let mut active: ActiveModel = existing.into();
        active.last_synced_at = Set(Some(now.into()));
        active.updated_at = Set(now.into());
        active.update(self.db).await?;
        Ok(())
    }
}
