//! # Content Cache
//!
//! Content-addressable cache of repository files. Reads go through
//! [`ContentCache::get_or_fetch`], which revalidates against the provider
//! blob hash before serving cached bytes. Files above the configured size
//! ceiling are served straight through and never stored.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tracing::debug;

use crate::config::AppConfig;
use crate::models::repo;
use crate::provider::{ProviderApi, SyncError};
use crate::repositories::CachedFileRepository;
use crate::sync::retry::with_retry;
use crate::sync::{SyncFailure, resolve_token};

pub mod warmer;

pub use warmer::{CacheWarmer, WarmStats};

/// A file served from the cache layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    pub path: String,
    pub content: Vec<u8>,
    pub content_hash: String,
    /// True when the bytes came from the local cache without a content
    /// download.
    pub from_cache: bool,
}

/// Hash-revalidating read path over the cached file store.
pub struct ContentCache {
    db: DatabaseConnection,
    provider: Arc<dyn ProviderApi>,
    config: Arc<AppConfig>,
}

impl ContentCache {
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

    /// Fetch a file at the repository's default branch, serving cached
    /// bytes when the provider hash still matches.
    ///
    /// The metadata request always goes out; only the content download is
    /// saved on a cache hit. Oversized files are passed through uncached.
    pub async fn get_or_fetch(
        &self,
        repo: &repo::Model,
        path: &str,
    ) -> Result<FetchedFile, SyncFailure> {
        let token = resolve_token(repo, &self.config)?;
        let cache = CachedFileRepository::new(&self.db);

        let remote = with_retry("get_file", &self.config.push_retry, || {
            self.provider
                .get_file(&token, &repo.owner, &repo.name, path, &repo.default_branch)
        })
        .await?;

        if let Some(cached) = cache.find(repo.id, path).await? {
            if cached.content_hash == remote.sha {
                cache.touch(repo.id, path).await?;
                metrics::counter!("cache_reads_total", "outcome" => "hit").increment(1);
                return Ok(FetchedFile {
                    path: cached.path,
                    content: cached.content,
                    content_hash: cached.content_hash,
                    from_cache: true,
                });
            }
        }

        let content = self.fetch_content(repo, &token, &remote).await?;

        if content.len() as u64 > self.config.cache_max_blob_bytes {
            debug!(
                repo = %repo.full_name(),
                path,
                size = content.len(),
                "File exceeds cache ceiling, serving uncached"
            );
            metrics::counter!("cache_reads_total", "outcome" => "oversized").increment(1);
            return Ok(FetchedFile {
                path: path.to_string(),
                content,
                content_hash: remote.sha,
                from_cache: false,
            });
        }

        cache
            .upsert(repo.id, path, &remote.sha, content.clone())
            .await?;
        metrics::counter!("cache_reads_total", "outcome" => "miss").increment(1);

        Ok(FetchedFile {
            path: path.to_string(),
            content,
            content_hash: remote.sha,
            from_cache: false,
        })
    }

    /// Resolve the file bytes, falling back to the blob endpoint when the
    /// contents response omitted them.
    async fn fetch_content(
        &self,
        repo: &repo::Model,
        token: &str,
        remote: &crate::provider::types::RemoteFile,
    ) -> Result<Vec<u8>, SyncFailure> {
        if let Some(content) = remote.decoded_content()? {
            return Ok(content);
        }

        let blob = with_retry("get_blob", &self.config.push_retry, || {
            self.provider
                .get_blob(token, &repo.owner, &repo.name, &remote.sha)
        })
        .await?;
        blob.decoded_content()?.ok_or_else(|| {
            SyncFailure::Provider(SyncError::permanent(format!(
                "blob {} carries no content",
                remote.sha
            )))
        })
    }
}

/// Whether a listed file size fits under the cache ceiling.
pub(crate) fn within_ceiling(size: i64, ceiling: u64) -> bool {
    size >= 0 && (size as u64) <= ceiling
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose};
    use serde_json::json;
    use wiremock::matchers::{method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::PushRetryConfig;
    use crate::provider::GitHubProvider;
    use crate::repositories::test_support::{insert_repo, setup_db};

    fn test_config(api_base: &str, ceiling: u64) -> Arc<AppConfig> {
        Arc::new(AppConfig {
            provider_api_base: api_base.to_string(),
            cache_max_blob_bytes: ceiling,
            push_retry: PushRetryConfig {
                max_attempts: 3,
                base_seconds: 0,
                max_seconds: 0,
                jitter_factor: 0.0,
            },
            ..AppConfig::default()
        })
    }

    fn contents_response(path: &str, sha: &str, body: &[u8]) -> serde_json::Value {
        json!({
            "name": path.rsplit('/').next().unwrap_or(path),
            "path": path,
            "sha": sha,
            "size": body.len(),
            "content": general_purpose::STANDARD.encode(body),
            "encoding": "base64"
        })
    }

    async fn build_cache(server: &MockServer, db: &DatabaseConnection, ceiling: u64) -> ContentCache {
        let config = test_config(&server.uri(), ceiling);
        let provider: Arc<dyn ProviderApi> = Arc::new(GitHubProvider::new(&config));
        ContentCache::new(db.clone(), provider, config)
    }

    #[tokio::test]
    async fn test_miss_then_hit_with_unchanged_hash() {
        let server = MockServer::start().await;
        let db = setup_db().await;
        let repo = insert_repo(&db, 1).await;

        Mock::given(method("GET"))
            .and(url_path(format!(
                "/repos/octocat/{}/contents/README.md",
                repo.name
            )))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(contents_response("README.md", "sha-a", b"hello")),
            )
            .expect(2)
            .mount(&server)
            .await;

        let cache = build_cache(&server, &db, 1_048_576).await;

        let first = cache.get_or_fetch(&repo, "README.md").await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.content, b"hello");

        let second = cache.get_or_fetch(&repo, "README.md").await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.content, b"hello");
        assert_eq!(second.content_hash, "sha-a");
    }

    #[tokio::test]
    async fn test_changed_hash_replaces_cached_content() {
        let server = MockServer::start().await;
        let db = setup_db().await;
        let repo = insert_repo(&db, 1).await;
        let cache = build_cache(&server, &db, 1_048_576).await;

        // Pre-seed the cache with the old version.
        CachedFileRepository::new(&db)
            .upsert(repo.id, "README.md", "sha-old", b"old".to_vec())
            .await
            .unwrap();

        Mock::given(method("GET"))
            .and(url_path(format!(
                "/repos/octocat/{}/contents/README.md",
                repo.name
            )))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(contents_response("README.md", "sha-new", b"new content")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetched = cache.get_or_fetch(&repo, "README.md").await.unwrap();
        assert!(!fetched.from_cache);
        assert_eq!(fetched.content, b"new content");

        let stored = CachedFileRepository::new(&db)
            .find(repo.id, "README.md")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.content_hash, "sha-new");
        assert_eq!(stored.content, b"new content");
    }

    #[tokio::test]
    async fn test_oversized_file_served_but_not_cached() {
        let server = MockServer::start().await;
        let db = setup_db().await;
        let repo = insert_repo(&db, 1).await;
        // 16-byte ceiling for the test.
        let cache = build_cache(&server, &db, 16).await;

        let big = vec![b'x'; 64];
        Mock::given(method("GET"))
            .and(url_path(format!(
                "/repos/octocat/{}/contents/big.bin",
                repo.name
            )))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(contents_response("big.bin", "sha-big", &big)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetched = cache.get_or_fetch(&repo, "big.bin").await.unwrap();
        assert!(!fetched.from_cache);
        assert_eq!(fetched.content.len(), 64);

        assert!(
            CachedFileRepository::new(&db)
                .find(repo.id, "big.bin")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_rate_limited_fetch_is_retried() {
        let server = MockServer::start().await;
        let db = setup_db().await;
        let repo = insert_repo(&db, 1).await;
        let cache = build_cache(&server, &db, 1_048_576).await;

        // First metadata request is rate limited, the retry succeeds.
        Mock::given(method("GET"))
            .and(url_path(format!(
                "/repos/octocat/{}/contents/README.md",
                repo.name
            )))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path(format!(
                "/repos/octocat/{}/contents/README.md",
                repo.name
            )))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(contents_response("README.md", "sha-a", b"hello")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetched = cache.get_or_fetch(&repo, "README.md").await.unwrap();
        assert!(!fetched.from_cache);
        assert_eq!(fetched.content, b"hello");
    }

    #[tokio::test]
    async fn test_blob_fallback_when_content_is_omitted() {
        let server = MockServer::start().await;
        let db = setup_db().await;
        let repo = insert_repo(&db, 1).await;
        let cache = build_cache(&server, &db, 1_048_576).await;

        Mock::given(method("GET"))
            .and(url_path(format!(
                "/repos/octocat/{}/contents/large.txt",
                repo.name
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "large.txt",
                "path": "large.txt",
                "sha": "sha-blob",
                "size": 12,
                "content": "",
                "encoding": "none"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path(format!(
                "/repos/octocat/{}/git/blobs/sha-blob",
                repo.name
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sha": "sha-blob",
                "size": 12,
                "content": general_purpose::STANDARD.encode(b"blob content"),
                "encoding": "base64"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let fetched = cache.get_or_fetch(&repo, "large.txt").await.unwrap();
        assert_eq!(fetched.content, b"blob content");
        assert_eq!(fetched.content_hash, "sha-blob");
    }
}
