//! # Sync Engine
//!
//! Mirrors remote repositories into the local database and pushes local
//! mutations back out. Inbound changes arrive through webhooks and the
//! paginated full sync; outbound changes go through the dispatcher with
//! retry on transient failures.

use std::sync::Arc;

use rand::RngCore;
use sea_orm::DatabaseConnection;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::cache::warmer::CacheWarmer;
use crate::config::AppConfig;
use crate::models::issue::{ISSUE_STATUS_BACKLOG, ISSUE_STATUS_CLOSED};
use crate::models::repo;
use crate::models::sync_log_entry::DIRECTION_INBOUND;
use crate::provider::types::NewWebhook;
use crate::provider::{ProviderApi, SyncError};
use crate::repositories::{RepoRepository, SyncLogRepository};

pub mod full_sync;
pub mod inbound;
pub mod outbound;
pub(crate) mod retry;

pub use full_sync::{FullSyncOrchestrator, FullSyncReport};
pub use inbound::InboundProcessor;
pub use outbound::OutboundDispatcher;

/// Events requested when registering the provider webhook.
const WEBHOOK_EVENTS: &[&str] = &["issues", "pull_request", "issue_comment", "ping"];

/// Failure modes of sync operations.
#[derive(Debug, Error)]
pub enum SyncFailure {
    #[error("repository {0} not found")]
    RepoNotFound(Uuid),

    #[error("a sync is already running for this repository")]
    AlreadySyncing,

    #[error("sync is disabled for this repository")]
    SyncDisabled,

    #[error("no access token available for this repository")]
    MissingCredentials,

    #[error("full sync timed out after {0}s")]
    TimedOut(u64),

    #[error("invalid event payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    #[error("provider error: {0}")]
    Provider(#[from] SyncError),
}

/// Resolve the credential for provider calls on behalf of a repository.
/// The per-repository token wins over the globally configured one.
pub(crate) fn resolve_token(
    repo: &repo::Model,
    config: &AppConfig,
) -> Result<String, SyncFailure> {
    repo.access_token
        .clone()
        .or_else(|| config.provider_token.clone())
        .ok_or(SyncFailure::MissingCredentials)
}

/// Map a remote issue state onto the local workflow status.
///
/// Closed always maps to closed. An open issue keeps whatever local
/// status it already has so workflow positions survive remote edits,
/// except that a reopened issue returns to the backlog.
pub(crate) fn local_issue_status(remote_state: &str, existing: Option<&str>) -> String {
    if remote_state == "closed" {
        return ISSUE_STATUS_CLOSED.to_string();
    }
    match existing {
        Some(status) if status != ISSUE_STATUS_CLOSED => status.to_string(),
        _ => ISSUE_STATUS_BACKLOG.to_string(),
    }
}

fn generate_webhook_secret() -> String {
    let mut buf = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Link a remote repository and kick off its initial sync.
///
/// Verifies the token can push to the repository, stores it locally with
/// a fresh webhook secret, registers the provider webhook when a public
/// base URL is configured, records a repository overview in the sync log
/// and spawns the initial full sync and cache warm in the background.
#[instrument(skip(db, provider, config, token))]
pub async fn import_repository(
    db: DatabaseConnection,
    provider: Arc<dyn ProviderApi>,
    config: Arc<AppConfig>,
    owner: &str,
    name: &str,
    token: Option<String>,
) -> Result<repo::Model, SyncFailure> {
    let token = token
        .or_else(|| config.provider_token.clone())
        .ok_or(SyncFailure::MissingCredentials)?;

    let remote = provider.get_repo(&token, owner, name).await?;
    let can_push = remote
        .permissions
        .as_ref()
        .map(|p| p.push || p.admin)
        .unwrap_or(false);
    if !can_push {
        return Err(SyncFailure::Provider(SyncError::unauthorized(format!(
            "token has no push access to {}",
            remote.full_name
        ))));
    }

    let secret = generate_webhook_secret();
    let repos = RepoRepository::new(&db);
    let repo = repos
        .create(&remote, Some(token.clone()), Some(secret.clone()))
        .await?;

    info!(repo = %repo.full_name(), "Linked remote repository");
    metrics::counter!("sync_repos_imported_total").increment(1);

    if let Some(base_url) = &config.webhook_base_url {
        let hook = NewWebhook {
            url: format!("{}/provider/webhook", base_url.trim_end_matches('/')),
            secret,
            events: WEBHOOK_EVENTS.iter().map(|e| e.to_string()).collect(),
        };
        match provider.create_webhook(&token, owner, name, &hook).await {
            Ok(webhook) => {
                repos.set_webhook_id(repo.id, webhook.id).await?;
                info!(repo = %repo.full_name(), webhook_id = webhook.id, "Registered webhook");
            }
            Err(err) => {
                // The repository is usable without a webhook; full sync
                // still covers it.
                warn!(repo = %repo.full_name(), error = %err, "Webhook registration failed");
            }
        }
    }

    record_overview(&db, &*provider, &config, &repo, &token).await;

    let sync_db = db.clone();
    let sync_provider = Arc::clone(&provider);
    let sync_config = Arc::clone(&config);
    let repo_id = repo.id;
    let repo_name = repo.full_name();
    tokio::spawn(async move {
        let orchestrator = FullSyncOrchestrator::new(sync_db.clone(), sync_provider.clone(), sync_config.clone());
        match orchestrator.run(repo_id).await {
            Ok(report) => {
                info!(
                    repo = %repo_name,
                    issues = report.issues,
                    pull_requests = report.pull_requests,
                    "Initial full sync finished"
                );
            }
            Err(err) => {
                error!(repo = %repo_name, error = %err, "Initial full sync failed");
                return;
            }
        }

        let warmer = CacheWarmer::new(sync_db, sync_provider, sync_config);
        match warmer.warm(repo_id).await {
            Ok(stats) => {
                info!(
                    repo = %repo_name,
                    cached = stats.cached,
                    skipped = stats.skipped,
                    failed = stats.failed,
                    "Cache warm finished"
                );
            }
            Err(err) => {
                error!(repo = %repo_name, error = %err, "Cache warm failed");
            }
        }
    });

    Ok(repo)
}

/// Collect a best-effort overview of the repository (languages, branches,
/// head commit) into the sync log. Failures are logged and ignored.
async fn record_overview(
    db: &DatabaseConnection,
    provider: &dyn ProviderApi,
    config: &AppConfig,
    repo: &repo::Model,
    token: &str,
) {
    let owner = &repo.owner;
    let name = &repo.name;

    let languages = provider
        .get_languages(token, owner, name)
        .await
        .unwrap_or_default();
    let branches = provider
        .list_branches(token, owner, name, 1, config.sync_page_size)
        .await
        .map(|branches| branches.into_iter().map(|b| b.name).collect::<Vec<_>>())
        .unwrap_or_default();
    let head_commit = provider
        .list_commits(token, owner, name, 1, 1)
        .await
        .ok()
        .and_then(|commits| commits.into_iter().next());

    // Seed the cache with the readme so the first content request is warm.
    if let Ok(readme) = provider.get_readme(token, owner, name).await {
        if let (Some(path), Ok(Some(content))) = (readme.path.clone(), readme.decoded_content()) {
            if crate::cache::within_ceiling(content.len() as i64, config.cache_max_blob_bytes) {
                let cache = crate::repositories::CachedFileRepository::new(db);
                if let Err(err) = cache.upsert(repo.id, &path, &readme.sha, content).await {
                    warn!(repo = %repo.full_name(), error = %err, "Failed to seed readme into cache");
                }
            }
        }
    }

    let payload = json!({
        "languages": languages,
        "branches": branches,
        "head_commit": head_commit.map(|c| json!({
            "sha": c.sha,
            "message": c.commit.message,
        })),
    });

    let log = SyncLogRepository::new(db);
    if let Err(err) = log
        .append(
            Some(repo.id),
            "repo_imported",
            DIRECTION_INBOUND,
            true,
            None,
            Some(payload),
        )
        .await
    {
        warn!(repo = %repo.full_name(), error = %err, "Failed to record import overview");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_issue_status_closed_wins() {
        assert_eq!(local_issue_status("closed", Some("in_progress")), "closed");
        assert_eq!(local_issue_status("closed", None), "closed");
    }

    #[test]
    fn test_local_issue_status_open_keeps_workflow_position() {
        assert_eq!(
            local_issue_status("open", Some("in_progress")),
            "in_progress"
        );
    }

    #[test]
    fn test_local_issue_status_reopened_returns_to_backlog() {
        assert_eq!(local_issue_status("open", Some("closed")), "backlog");
        assert_eq!(local_issue_status("open", None), "backlog");
    }

    #[test]
    fn test_generated_secrets_are_unique_hex() {
        let a = generate_webhook_secret();
        let b = generate_webhook_secret();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
