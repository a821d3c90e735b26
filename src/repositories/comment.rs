//! # Comment Repository
//!
//! Data access for comments. A comment hangs off exactly one parent,
//! either an issue or a pull request; the two upsert entry points keep
//! the exclusivity explicit.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::models::comment::{ActiveModel, Column, Entity as Comment, Model};
use crate::provider::types::RemoteComment;

/// Repository for comment database operations
pub struct CommentRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> CommentRepository<'a> {
    /// Create a new CommentRepository with the given database connection
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Model>, sea_orm::DbErr> {
        Comment::find_by_id(id).one(self.db).await
    }

    /// Look up a comment by its parent and the provider-side comment id.
    ///
    /// Remote comment ids are only unique within a parent thread, so the
    /// lookup always carries the parent.
    pub async fn find_by_remote(
        &self,
        issue_id: Option<Uuid>,
        pull_request_id: Option<Uuid>,
        remote_id: i64,
    ) -> Result<Option<Model>, sea_orm::DbErr> {
        let mut query = Comment::find().filter(Column::RemoteId.eq(remote_id));
        query = match (issue_id, pull_request_id) {
            (Some(issue_id), _) => query.filter(Column::IssueId.eq(issue_id)),
            (None, Some(pull_request_id)) => {
                query.filter(Column::PullRequestId.eq(pull_request_id))
            }
            (None, None) => query.filter(Column::IssueId.is_null()),
        };
        query.one(self.db).await
    }

    /// Insert or update a remote comment under an issue.
    pub async fn upsert_remote_on_issue(
        &self,
        issue_id: Uuid,
        remote: &RemoteComment,
    ) -> Result<Model, sea_orm::DbErr> {
        self.upsert_remote(Some(issue_id), None, remote).await
    }

    /// Insert or update a remote comment under a pull request.
    pub async fn upsert_remote_on_pull(
        &self,
        pull_request_id: Uuid,
        remote: &RemoteComment,
    ) -> Result<Model, sea_orm::DbErr> {
        self.upsert_remote(None, Some(pull_request_id), remote).await
    }

    async fn upsert_remote(
        &self,
        issue_id: Option<Uuid>,
        pull_request_id: Option<Uuid>,
        remote: &RemoteComment,
    ) -> Result<Model, sea_orm::DbErr> {
        let now = Utc::now();

        match self
            .find_by_remote(issue_id, pull_request_id, remote.id)
            .await?
        {
            Some(existing) => {
                let mut active: ActiveModel = existing.into();
                active.body = Set(remote.body.clone());
                active.author = Set(remote.user.login.clone());
                active.remote_url = Set(Some(remote.html_url.clone()));
                active.last_synced_at = Set(Some(now.into()));
                active.updated_at = Set(now.into());
                active.update(self.db).await
            }
            None => {
                let active = ActiveModel {
                    id: Set(Uuid::new_v4()),
                    issue_id: Set(issue_id),
                    pull_request_id: Set(pull_request_id),
                    body: Set(remote.body.clone()),
                    author: Set(remote.user.login.clone()),
                    remote_id: Set(Some(remote.id)),
                    remote_url: Set(Some(remote.html_url.clone())),
                    last_synced_at: Set(Some(now.into())),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                };
                active.insert(self.db).await
            }
        }
    }

    /// Fill in the remote identity after an outbound create.
    pub async fn set_remote_identity(
        &self,
        id: Uuid,
        remote_id: i64,
        remote_url: &str,
    ) -> Result<Model, sea_orm::DbErr> {
        let existing = Comment::find_by_id(id)
            .one(self.db)
            .await?
            .ok_or_else(|| sea_orm::DbErr::RecordNotFound(format!("comment {}", id)))?;

        let now = Utc::now();
        let mut active: ActiveModel = existing.into();
        active.remote_id = Set(Some(remote_id));
        active.remote_url = Set(Some(remote_url.to_string()));
        active.last_synced_at = Set(Some(now.into()));
        active.updated_at = Set(now.into());
        active.update(self.db).await
    }
}
