//! # Cache Warmer
//!
//! Walks a repository's file tree after import and seeds the content
//! cache. The walk is iterative over the contents listing; files above
//! the size ceiling are counted but never downloaded.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cache::within_ceiling;
use crate::config::AppConfig;
use crate::models::repo;
use crate::provider::ProviderApi;
use crate::repositories::{CachedFileRepository, RepoRepository};
use crate::sync::retry::with_retry;
use crate::sync::{SyncFailure, resolve_token};

/// Counts from one cache warm pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmStats {
    /// Files written to or refreshed in the cache
    pub cached: u64,
    /// Files skipped for exceeding the size ceiling
    pub skipped: u64,
    /// Files whose fetch failed after retries
    pub failed: u64,
    /// Files seen in the tree walk
    pub total: u64,
}

/// Seeds the content cache for a repository.
pub struct CacheWarmer {
    db: DatabaseConnection,
    provider: Arc<dyn ProviderApi>,
    config: Arc<AppConfig>,
}

impl CacheWarmer {
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

    /// Walk the tree at the default branch and cache every file under the
    /// size ceiling. Individual file failures are logged and counted; a
    /// listing failure aborts the walk once retries are exhausted.
    #[instrument(skip(self), fields(repo_id = %repo_id))]
    pub async fn warm(&self, repo_id: Uuid) -> Result<WarmStats, SyncFailure> {
        let repo = RepoRepository::new(&self.db)
            .find_by_id(repo_id)
            .await?
            .ok_or(SyncFailure::RepoNotFound(repo_id))?;
        let token = resolve_token(&repo, &self.config)?;

        let mut stats = WarmStats::default();
        let mut pending: Vec<String> = vec![String::new()];

        while let Some(dir) = pending.pop() {
            let entries = with_retry("get_contents", &self.config.push_retry, || {
                self.provider
                    .get_contents(&token, &repo.owner, &repo.name, &dir, &repo.default_branch)
            })
            .await?;

            for entry in entries {
                if entry.is_dir() {
                    pending.push(entry.path);
                    continue;
                }
                if !entry.is_file() {
                    // Submodules and symlinks are not cacheable content.
                    continue;
                }

                stats.total += 1;
                if !within_ceiling(entry.size, self.config.cache_max_blob_bytes) {
                    debug!(
                        repo = %repo.full_name(),
                        path = %entry.path,
                        size = entry.size,
                        "Skipping oversized file"
                    );
                    stats.skipped += 1;
                    continue;
                }

                match self.warm_file(&repo, &token, &entry.path, &entry.sha).await {
                    Ok(()) => stats.cached += 1,
                    Err(err) => {
                        warn!(
                            repo = %repo.full_name(),
                            path = %entry.path,
                            error = %err,
                            "Failed to warm file, continuing"
                        );
                        stats.failed += 1;
                    }
                }
            }
        }

        info!(
            repo = %repo.full_name(),
            cached = stats.cached,
            skipped = stats.skipped,
            failed = stats.failed,
            total = stats.total,
            "Cache warm pass complete"
        );
        metrics::counter!("cache_warm_files_total").increment(stats.cached);

        Ok(stats)
    }

    async fn warm_file(
        &self,
        repo: &repo::Model,
        token: &str,
        path: &str,
        sha: &str,
    ) -> Result<(), SyncFailure> {
        let cache = CachedFileRepository::new(&self.db);

        // Unchanged hash means the blob is already cached; skip the
        // download and just refresh the timestamp.
        if let Some(existing) = cache.find(repo.id, path).await? {
            if existing.content_hash == sha {
                cache.touch(repo.id, path).await?;
                return Ok(());
            }
        }

        let file = with_retry("get_file", &self.config.push_retry, || {
            self.provider
                .get_file(token, &repo.owner, &repo.name, path, &repo.default_branch)
        })
        .await?;

        let content = match file.decoded_content()? {
            Some(content) => content,
            None => {
                let blob = with_retry("get_blob", &self.config.push_retry, || {
                    self.provider
                        .get_blob(token, &repo.owner, &repo.name, &file.sha)
                })
                .await?;
                blob.decoded_content()?.unwrap_or_default()
            }
        };

        cache.upsert(repo.id, path, &file.sha, content).await?;
        Ok(())
    }
}
