//! # Full Sync
//!
//! Pulls the complete issue and pull request state of a remote repository
//! through the paginated listing endpoints. The repository's sync status
//! acts as an advisory lock so only one full sync runs at a time; the
//! whole run is bounded by a wall clock timeout.

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::sync_log_entry::DIRECTION_INBOUND;
use crate::provider::ProviderApi;
use crate::repositories::{
    IssueRepository, PullRequestRepository, RepoRepository, SyncLogRepository,
};
use crate::sync::{SyncFailure, local_issue_status, resolve_token};

/// Counts of records reconciled by one full sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FullSyncReport {
    pub issues: u64,
    pub pull_requests: u64,
}

/// Runs full syncs against the remote provider.
pub struct FullSyncOrchestrator {
    db: DatabaseConnection,
    provider: Arc<dyn ProviderApi>,
    config: Arc<AppConfig>,
}

impl FullSyncOrchestrator {
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

    /// Run a full sync for the repository, claiming the sync lock first.
    ///
    /// On success the lock is released and the run is recorded in the sync
    /// log. On failure or timeout the repository is marked errored so a
    /// later run can claim it again.
    #[instrument(skip(self), fields(repo_id = %repo_id))]
    pub async fn run(&self, repo_id: Uuid) -> Result<FullSyncReport, SyncFailure> {
        let repos = RepoRepository::new(&self.db);
        let repo = repos
            .find_by_id(repo_id)
            .await?
            .ok_or(SyncFailure::RepoNotFound(repo_id))?;

        if !repo.sync_enabled {
            return Err(SyncFailure::SyncDisabled);
        }
        let token = resolve_token(&repo, &self.config)?;

        if !repos.begin_sync(repo_id).await? {
            return Err(SyncFailure::AlreadySyncing);
        }

        info!(repo = %repo.full_name(), "Full sync started");
        let timeout = Duration::from_secs(self.config.full_sync_timeout_seconds);
        let outcome = tokio::time::timeout(timeout, self.sync_all(&repo, &token)).await;

        match outcome {
            Ok(Ok(report)) => {
                repos.finish_sync(repo_id).await?;
                self.log_run(repo_id, true, None, &report).await;
                info!(
                    repo = %repo.full_name(),
                    issues = report.issues,
                    pull_requests = report.pull_requests,
                    "Full sync finished"
                );
                metrics::counter!("sync_full_runs_total", "outcome" => "success").increment(1);
                Ok(report)
            }
            Ok(Err(err)) => {
                repos.fail_sync(repo_id).await?;
                self.log_run(repo_id, false, Some(&err.to_string()), &FullSyncReport::default())
                    .await;
                metrics::counter!("sync_full_runs_total", "outcome" => "error").increment(1);
                Err(err)
            }
            Err(_) => {
                repos.fail_sync(repo_id).await?;
                let err = SyncFailure::TimedOut(self.config.full_sync_timeout_seconds);
                self.log_run(repo_id, false, Some(&err.to_string()), &FullSyncReport::default())
                    .await;
                metrics::counter!("sync_full_runs_total", "outcome" => "timeout").increment(1);
                Err(err)
            }
        }
    }

    async fn sync_all(
        &self,
        repo: &crate::models::repo::Model,
        token: &str,
    ) -> Result<FullSyncReport, SyncFailure> {
        let issues = self.sync_issues(repo, token).await?;
        let pull_requests = self.sync_pulls(repo, token).await?;
        Ok(FullSyncReport {
            issues,
            pull_requests,
        })
    }

    /// Walk the issues listing page by page. Pull requests interleaved in
    /// the listing are skipped; they come through the dedicated endpoint.
    async fn sync_issues(
        &self,
        repo: &crate::models::repo::Model,
        token: &str,
    ) -> Result<u64, SyncFailure> {
        let issues = IssueRepository::new(&self.db);
        let per_page = self.config.sync_page_size;
        let mut count: u64 = 0;

        for page in 1u32.. {
            let batch = self
                .provider
                .list_issues(token, &repo.owner, &repo.name, "all", page, per_page)
                .await?;
            let batch_len = batch.len();

            for remote in &batch {
                if remote.is_pull_request() {
                    continue;
                }
                let existing = issues.find_by_remote(repo.id, remote.number).await?;
                let status =
                    local_issue_status(&remote.state, existing.as_ref().map(|m| m.status.as_str()));
                issues.upsert_remote(repo.id, remote, &status).await?;
                count += 1;
            }

            // A short page is the last one.
            if batch_len < per_page as usize {
                break;
            }
        }

        Ok(count)
    }

    async fn sync_pulls(
        &self,
        repo: &crate::models::repo::Model,
        token: &str,
    ) -> Result<u64, SyncFailure> {
        let pulls = PullRequestRepository::new(&self.db);
        let per_page = self.config.sync_page_size;
        let mut count: u64 = 0;

        for page in 1u32.. {
            let batch = self
                .provider
                .list_pulls(token, &repo.owner, &repo.name, "all", page, per_page)
                .await?;
            let batch_len = batch.len();

            for remote in &batch {
                pulls.upsert_remote(repo.id, remote).await?;
                count += 1;
            }

            if batch_len < per_page as usize {
                break;
            }
        }

        Ok(count)
    }

    async fn log_run(
        &self,
        repo_id: Uuid,
        success: bool,
        error: Option<&str>,
        report: &FullSyncReport,
    ) {
        let log = SyncLogRepository::new(&self.db);
        let payload = json!({
            "issues": report.issues,
            "pull_requests": report.pull_requests,
        });
        if let Err(err) = log
            .append(
                Some(repo_id),
                "full_sync",
                DIRECTION_INBOUND,
                success,
                error,
                Some(payload),
            )
            .await
        {
            warn!(error = %err, "Failed to record full sync log entry");
        }
    }
}
