//! # Outbound Push
//!
//! Pushes local mutations to the remote provider. Creates close the
//! remote identity loop by writing the returned id, node id and URL back
//! onto the local record. Retryable failures are retried with capped
//! exponential backoff and jitter; rate limit hints extend the delay.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::issue::ISSUE_STATUS_CLOSED;
use crate::models::sync_log_entry::DIRECTION_OUTBOUND;
use crate::models::{comment, issue, pull_request, repo};
use crate::provider::types::{IssueUpdate, NewComment, NewIssue, NewPull};
use crate::provider::ProviderApi;
use crate::repositories::{
    CommentRepository, IssueRepository, PullRequestRepository, RepoRepository, SyncLogRepository,
};
use crate::sync::retry::with_retry;
use crate::sync::{SyncFailure, resolve_token};

/// Pushes local mutations out to the provider.
pub struct OutboundDispatcher {
    db: DatabaseConnection,
    provider: Arc<dyn ProviderApi>,
    config: Arc<AppConfig>,
}

impl OutboundDispatcher {
    pub fn new(
        db: DatabaseConnection,
        provider: Arc<dyn ProviderApi>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            provider,
            config,
        }
    }

    /// Push a locally created issue. On success the remote identity
    /// triple is written back onto the local record.
    #[instrument(skip(self), fields(issue_id = %issue_id))]
    pub async fn push_issue_create(&self, issue_id: Uuid) -> Result<(), SyncFailure> {
        let issues = IssueRepository::new(&self.db);
        let local = issues
            .find_by_id(issue_id)
            .await?
            .ok_or_else(|| SyncFailure::Db(sea_orm::DbErr::RecordNotFound(format!(
                "issue {}",
                issue_id
            ))))?;

        if local.remote_id.is_some() {
            // Already pushed; nothing to create.
            return Ok(());
        }
        let (repo, token) = self.load_push_target(local.repo_id).await?;

        let new_issue = NewIssue {
            title: local.title.clone(),
            body: local.body.clone(),
            labels: label_names(&local.labels),
        };

        let result = with_retry("create_issue", &self.config.push_retry, || {
            self.provider
                .create_issue(&token, &repo.owner, &repo.name, &new_issue)
        })
        .await;

        match result {
            Ok(remote) => {
                issues
                    .set_remote_identity(issue_id, remote.number, &remote.node_id, &remote.html_url)
                    .await?;
                self.log_push(&repo, "push_issue_create", true, None, json!({"number": remote.number}))
                    .await;
                info!(repo = %repo.full_name(), number = remote.number, "Pushed issue create");
                Ok(())
            }
            Err(err) => {
                self.log_push(
                    &repo,
                    "push_issue_create",
                    false,
                    Some(&err.to_string()),
                    json!({"issue_id": issue_id}),
                )
                .await;
                Err(err.into())
            }
        }
    }

    /// Push a local edit to an issue that already has a remote identity.
    /// Issues that were never pushed are skipped.
    #[instrument(skip(self), fields(issue_id = %issue_id))]
    pub async fn push_issue_update(&self, issue_id: Uuid) -> Result<(), SyncFailure> {
        let issues = IssueRepository::new(&self.db);
        let local = issues
            .find_by_id(issue_id)
            .await?
            .ok_or_else(|| SyncFailure::Db(sea_orm::DbErr::RecordNotFound(format!(
                "issue {}",
                issue_id
            ))))?;

        let Some(number) = local.remote_id else {
            return Ok(());
        };
        let (repo, token) = self.load_push_target(local.repo_id).await?;

        let state = if local.status == ISSUE_STATUS_CLOSED {
            "closed"
        } else {
            "open"
        };
        let update = IssueUpdate {
            title: Some(local.title.clone()),
            body: local.body.clone(),
            state: Some(state.to_string()),
            labels: Some(label_names(&local.labels)),
        };

        let result = with_retry("update_issue", &self.config.push_retry, || {
            self.provider
                .update_issue(&token, &repo.owner, &repo.name, number, &update)
        })
        .await;

        match result {
            Ok(_) => {
                issues.mark_synced(issue_id).await?;
                self.log_push(&repo, "push_issue_update", true, None, json!({"number": number}))
                    .await;
                Ok(())
            }
            Err(err) => {
                self.log_push(
                    &repo,
                    "push_issue_update",
                    false,
                    Some(&err.to_string()),
                    json!({"number": number}),
                )
                .await;
                Err(err.into())
            }
        }
    }

    /// Push a locally created pull request.
    #[instrument(skip(self), fields(pull_id = %pull_id))]
    pub async fn push_pull_create(&self, pull_id: Uuid) -> Result<(), SyncFailure> {
        let pulls = PullRequestRepository::new(&self.db);
        let local = pulls
            .find_by_id(pull_id)
            .await?
            .ok_or_else(|| SyncFailure::Db(sea_orm::DbErr::RecordNotFound(format!(
                "pull request {}",
                pull_id
            ))))?;

        if local.remote_id.is_some() {
            return Ok(());
        }
        let (repo, token) = self.load_push_target(local.repo_id).await?;

        let new_pull = NewPull {
            title: local.title.clone(),
            body: local.body.clone(),
            head: local.head_branch.clone(),
            base: local.base_branch.clone(),
        };

        let result = with_retry("create_pull", &self.config.push_retry, || {
            self.provider
                .create_pull(&token, &repo.owner, &repo.name, &new_pull)
        })
        .await;

        match result {
            Ok(remote) => {
                pulls
                    .set_remote_identity(pull_id, remote.number, &remote.node_id, &remote.html_url)
                    .await?;
                self.log_push(&repo, "push_pull_create", true, None, json!({"number": remote.number}))
                    .await;
                info!(repo = %repo.full_name(), number = remote.number, "Pushed pull request create");
                Ok(())
            }
            Err(err) => {
                self.log_push(
                    &repo,
                    "push_pull_create",
                    false,
                    Some(&err.to_string()),
                    json!({"pull_id": pull_id}),
                )
                .await;
                Err(err.into())
            }
        }
    }

    /// Push a locally created comment. The parent issue or pull request
    /// must already have a remote identity.
    #[instrument(skip(self), fields(comment_id = %comment_id))]
    pub async fn push_comment_create(&self, comment_id: Uuid) -> Result<(), SyncFailure> {
        let comments = CommentRepository::new(&self.db);
        let local = comments
            .find_by_id(comment_id)
            .await?
            .ok_or_else(|| SyncFailure::Db(sea_orm::DbErr::RecordNotFound(format!(
                "comment {}",
                comment_id
            ))))?;

        if local.remote_id.is_some() {
            return Ok(());
        }

        let (repo_id, parent_number) = self.comment_parent(&local).await?;
        let Some(parent_number) = parent_number else {
            // Parent was never pushed; the comment cannot be placed yet.
            warn!(comment_id = %comment_id, "Comment parent has no remote identity, skipping push");
            return Ok(());
        };
        let (repo, token) = self.load_push_target(repo_id).await?;

        let new_comment = NewComment {
            body: local.body.clone(),
        };

        let result = with_retry("create_issue_comment", &self.config.push_retry, || {
            self.provider.create_issue_comment(
                &token,
                &repo.owner,
                &repo.name,
                parent_number,
                &new_comment,
            )
        })
        .await;

        match result {
            Ok(remote) => {
                comments
                    .set_remote_identity(comment_id, remote.id, &remote.html_url)
                    .await?;
                self.log_push(
                    &repo,
                    "push_comment_create",
                    true,
                    None,
                    json!({"parent_number": parent_number}),
                )
                .await;
                Ok(())
            }
            Err(err) => {
                self.log_push(
                    &repo,
                    "push_comment_create",
                    false,
                    Some(&err.to_string()),
                    json!({"comment_id": comment_id}),
                )
                .await;
                Err(err.into())
            }
        }
    }

    /// Resolve a comment's repository and its parent's remote number.
    async fn comment_parent(
        &self,
        local: &comment::Model,
    ) -> Result<(Uuid, Option<i64>), SyncFailure> {
        if let Some(issue_id) = local.issue_id {
            let parent: issue::Model = IssueRepository::new(&self.db)
                .find_by_id(issue_id)
                .await?
                .ok_or_else(|| SyncFailure::Db(sea_orm::DbErr::RecordNotFound(format!(
                    "issue {}",
                    issue_id
                ))))?;
            return Ok((parent.repo_id, parent.remote_id));
        }
        if let Some(pull_id) = local.pull_request_id {
            let parent: pull_request::Model = PullRequestRepository::new(&self.db)
                .find_by_id(pull_id)
                .await?
                .ok_or_else(|| SyncFailure::Db(sea_orm::DbErr::RecordNotFound(format!(
                    "pull request {}",
                    pull_id
                ))))?;
            return Ok((parent.repo_id, parent.remote_id));
        }
        Err(SyncFailure::Db(sea_orm::DbErr::Custom(
            "comment has no parent".to_string(),
        )))
    }

    async fn load_push_target(&self, repo_id: Uuid) -> Result<(repo::Model, String), SyncFailure> {
        let repo = RepoRepository::new(&self.db)
            .find_by_id(repo_id)
            .await?
            .ok_or(SyncFailure::RepoNotFound(repo_id))?;
        if !repo.sync_enabled {
            return Err(SyncFailure::SyncDisabled);
        }
        let token = resolve_token(&repo, &self.config)?;
        Ok((repo, token))
    }

    async fn log_push(
        &self,
        repo: &repo::Model,
        event_type: &str,
        success: bool,
        error: Option<&str>,
        payload: serde_json::Value,
    ) {
        let outcome = if success { "success" } else { "error" };
        metrics::counter!("sync_outbound_pushes_total", "outcome" => outcome).increment(1);

        let log = SyncLogRepository::new(&self.db);
        if let Err(err) = log
            .append(
                Some(repo.id),
                event_type,
                DIRECTION_OUTBOUND,
                success,
                error,
                Some(payload),
            )
            .await
        {
            warn!(error = %err, "Failed to record outbound sync log entry");
        }
    }
}

fn label_names(labels: &serde_json::Value) -> Vec<String> {
    labels
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
