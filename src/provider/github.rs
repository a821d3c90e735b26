//! GitHub-shaped implementation of [`ProviderApi`]
//!
//! Every call authenticates with the token supplied by the caller, maps
//! upstream failures into the [`SyncError`] taxonomy and honors the
//! Retry-After hint on rate limit responses.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{error, warn};
use url::Url;

use super::{ProviderApi, SyncError, SyncErrorKind};
use super::types::{
    ContentEntry, IssueUpdate, NewComment, NewIssue, NewPull, NewWebhook, RemoteBranch,
    RemoteComment, RemoteCommit, RemoteFile, RemoteIssue, RemotePull, RemoteRepo, RemoteUser,
    RemoteWebhook,
};
use crate::config::AppConfig;

const USER_AGENT: &str = concat!("RepoMirror/", env!("CARGO_PKG_VERSION"));
const ACCEPT_HEADER: &str = "application/vnd.github+json";

/// HTTP client for the GitHub REST API (or a compatible enterprise host).
pub struct GitHubProvider {
    http: reqwest::Client,
    api_base: String,
    request_timeout: Duration,
}

impl GitHubProvider {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.provider_api_base.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, SyncError> {
        Url::parse(&format!("{}{}", self.api_base, path))
            .map_err(|e| SyncError::permanent(format!("invalid provider URL: {}", e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, token: &str, url: Url) -> Result<T, SyncError> {
        let response = self
            .http
            .get(url)
            .timeout(self.request_timeout)
            .header("Authorization", format!("Bearer {}", token))
            .header("User-Agent", USER_AGENT)
            .header("Accept", ACCEPT_HEADER)
            .send()
            .await
            .map_err(|e| SyncError::transient(format!("provider request failed: {}", e)))?;

        let response = Self::triage(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::transient(format!("malformed provider response: {}", e)))
    }

    async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        token: &str,
        url: Url,
        body: &B,
    ) -> Result<T, SyncError> {
        let response = self
            .http
            .request(method, url)
            .timeout(self.request_timeout)
            .header("Authorization", format!("Bearer {}", token))
            .header("User-Agent", USER_AGENT)
            .header("Accept", ACCEPT_HEADER)
            .json(body)
            .send()
            .await
            .map_err(|e| SyncError::transient(format!("provider request failed: {}", e)))?;

        let response = Self::triage(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::transient(format!("malformed provider response: {}", e)))
    }

    /// Map upstream status codes into the [`SyncError`] taxonomy.
    async fn triage(response: Response) -> Result<Response, SyncError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);

            warn!(retry_after, "Rate limited by provider API");
            return Err(SyncError::rate_limited(Some(retry_after)));
        }

        if status == StatusCode::UNAUTHORIZED {
            error!("Provider API authentication failed: 401 Unauthorized");
            return Err(SyncError::unauthorized(
                "provider authentication failed - token may be expired or revoked",
            ));
        }

        if status == StatusCode::FORBIDDEN {
            // Secondary rate limits answer 403 with rate limit headers.
            if response.headers().get("X-RateLimit-Remaining").is_some() {
                warn!("Provider API rate limit surfaced as 403");
                return Err(SyncError::rate_limited(None));
            }

            error!("Provider API permission denied: insufficient scopes");
            return Err(SyncError {
                kind: SyncErrorKind::Permanent,
                message: Some(
                    "Permission denied. Check that the token has the required repo scope"
                        .to_string(),
                ),
                details: None,
            });
        }

        let body = response.text().await.unwrap_or_default();

        if status.is_server_error() {
            warn!("Provider API server error: {} - {}", status, body);
            return Err(SyncError {
                kind: SyncErrorKind::Transient,
                message: Some(format!("provider server error: {}", status)),
                details: Some(serde_json::Value::String(body)),
            });
        }

        Err(SyncError {
            kind: SyncErrorKind::Permanent,
            message: Some(format!("provider error: {}", status)),
            details: Some(serde_json::Value::String(body)),
        })
    }

    fn paged_url(
        &self,
        path: &str,
        state: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> Result<Url, SyncError> {
        let mut url = self.endpoint(path)?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(state) = state {
                pairs.append_pair("state", state);
            }
            pairs
                .append_pair("per_page", &per_page.to_string())
                .append_pair("page", &page.to_string());
        }
        Ok(url)
    }
}

#[async_trait]
impl ProviderApi for GitHubProvider {
    async fn current_user(&self, token: &str) -> Result<RemoteUser, SyncError> {
        let url = self.endpoint("/user")?;
        self.get_json(token, url).await
    }

    async fn get_repo(
        &self,
        token: &str,
        owner: &str,
        name: &str,
    ) -> Result<RemoteRepo, SyncError> {
        let url = self.endpoint(&format!("/repos/{}/{}", owner, name))?;
        self.get_json(token, url).await
    }

    async fn list_issues(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        state: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RemoteIssue>, SyncError> {
        let url = self.paged_url(
            &format!("/repos/{}/{}/issues", owner, name),
            Some(state),
            page,
            per_page,
        )?;
        self.get_json(token, url).await
    }

    async fn list_pulls(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        state: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RemotePull>, SyncError> {
        let url = self.paged_url(
            &format!("/repos/{}/{}/pulls", owner, name),
            Some(state),
            page,
            per_page,
        )?;
        self.get_json(token, url).await
    }

    async fn create_issue(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        issue: &NewIssue,
    ) -> Result<RemoteIssue, SyncError> {
        let url = self.endpoint(&format!("/repos/{}/{}/issues", owner, name))?;
        self.send_json(reqwest::Method::POST, token, url, issue)
            .await
    }

    async fn update_issue(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        number: i64,
        update: &IssueUpdate,
    ) -> Result<RemoteIssue, SyncError> {
        let url = self.endpoint(&format!("/repos/{}/{}/issues/{}", owner, name, number))?;
        self.send_json(reqwest::Method::PATCH, token, url, update)
            .await
    }

    async fn create_pull(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        pull: &NewPull,
    ) -> Result<RemotePull, SyncError> {
        let url = self.endpoint(&format!("/repos/{}/{}/pulls", owner, name))?;
        self.send_json(reqwest::Method::POST, token, url, pull).await
    }

    async fn create_issue_comment(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        issue_number: i64,
        comment: &NewComment,
    ) -> Result<RemoteComment, SyncError> {
        let url = self.endpoint(&format!(
            "/repos/{}/{}/issues/{}/comments",
            owner, name, issue_number
        ))?;
        self.send_json(reqwest::Method::POST, token, url, comment)
            .await
    }

    async fn create_webhook(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        hook: &NewWebhook,
    ) -> Result<RemoteWebhook, SyncError> {
        let url = self.endpoint(&format!("/repos/{}/{}/hooks", owner, name))?;
        let body = serde_json::json!({
            "name": "web",
            "active": true,
            "events": hook.events,
            "config": {
                "url": hook.url,
                "content_type": "json",
                "secret": hook.secret,
            }
        });
        self.send_json(reqwest::Method::POST, token, url, &body)
            .await
    }

    async fn get_contents(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<Vec<ContentEntry>, SyncError> {
        let mut url = self.endpoint(&format!("/repos/{}/{}/contents/{}", owner, name, path))?;
        url.query_pairs_mut().append_pair("ref", git_ref);
        self.get_json(token, url).await
    }

    async fn get_file(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<RemoteFile, SyncError> {
        let mut url = self.endpoint(&format!("/repos/{}/{}/contents/{}", owner, name, path))?;
        url.query_pairs_mut().append_pair("ref", git_ref);
        self.get_json(token, url).await
    }

    async fn get_blob(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        sha: &str,
    ) -> Result<RemoteFile, SyncError> {
        let url = self.endpoint(&format!("/repos/{}/{}/git/blobs/{}", owner, name, sha))?;
        self.get_json(token, url).await
    }

    async fn get_readme(
        &self,
        token: &str,
        owner: &str,
        name: &str,
    ) -> Result<RemoteFile, SyncError> {
        let url = self.endpoint(&format!("/repos/{}/{}/readme", owner, name))?;
        self.get_json(token, url).await
    }

    async fn get_languages(
        &self,
        token: &str,
        owner: &str,
        name: &str,
    ) -> Result<BTreeMap<String, i64>, SyncError> {
        let url = self.endpoint(&format!("/repos/{}/{}/languages", owner, name))?;
        self.get_json(token, url).await
    }

    async fn list_branches(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RemoteBranch>, SyncError> {
        let url = self.paged_url(
            &format!("/repos/{}/{}/branches", owner, name),
            None,
            page,
            per_page,
        )?;
        self.get_json(token, url).await
    }

    async fn list_commits(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RemoteCommit>, SyncError> {
        let url = self.paged_url(
            &format!("/repos/{}/{}/commits", owner, name),
            None,
            page,
            per_page,
        )?;
        self.get_json(token, url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> GitHubProvider {
        let config = AppConfig {
            provider_api_base: server.uri(),
            ..Default::default()
        };
        GitHubProvider::new(&config)
    }

    fn issue_json(number: i64) -> serde_json::Value {
        serde_json::json!({
            "id": number * 1000,
            "node_id": format!("I_{}", number),
            "number": number,
            "title": format!("Issue {}", number),
            "body": "body",
            "state": "open",
            "user": {"id": 1, "login": "octocat"},
            "labels": [{"name": "bug"}],
            "html_url": format!("https://example.test/issues/{}", number)
        })
    }

    #[tokio::test]
    async fn test_list_issues_sends_pagination_params() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/octocat/demo/issues"))
            .and(query_param("state", "all"))
            .and(query_param("per_page", "100"))
            .and(query_param("page", "2"))
            .and(header("Authorization", "Bearer t0ken"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(vec![issue_json(1), issue_json(2)]),
            )
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server);
        let issues = provider
            .list_issues("t0ken", "octocat", "demo", "all", 2, 100)
            .await
            .unwrap();

        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].number, 1);
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_retry_after() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/octocat/demo/issues"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "120"))
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server);
        let err = provider
            .list_issues("t0ken", "octocat", "demo", "all", 1, 100)
            .await
            .unwrap_err();

        assert_eq!(
            err.kind,
            SyncErrorKind::RateLimited {
                retry_after_secs: Some(120)
            }
        );
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_unauthorized_kind() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server);
        let err = provider.current_user("bad").await.unwrap_err();

        assert_eq!(err.kind, SyncErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/octocat/demo"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server);
        let err = provider.get_repo("t0ken", "octocat", "demo").await.unwrap_err();

        assert_eq!(err.kind, SyncErrorKind::Transient);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_not_found_is_permanent() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/octocat/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server);
        let err = provider
            .get_repo("t0ken", "octocat", "missing")
            .await
            .unwrap_err();

        assert_eq!(err.kind, SyncErrorKind::Permanent);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_create_issue_returns_remote_identity() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/repos/octocat/demo/issues"))
            .respond_with(ResponseTemplate::new(201).set_body_json(issue_json(42)))
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server);
        let created = provider
            .create_issue(
                "t0ken",
                "octocat",
                "demo",
                &NewIssue {
                    title: "Issue 42".to_string(),
                    body: Some("body".to_string()),
                    labels: vec!["bug".to_string()],
                },
            )
            .await
            .unwrap();

        assert_eq!(created.number, 42);
        assert_eq!(created.node_id, "I_42");
    }

    #[tokio::test]
    async fn test_create_webhook_wraps_config() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/repos/octocat/demo/hooks"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 77})))
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server);
        let hook = provider
            .create_webhook(
                "t0ken",
                "octocat",
                "demo",
                &NewWebhook {
                    url: "https://mirror.example.test/provider/webhook".to_string(),
                    secret: "s3cret".to_string(),
                    events: vec!["issues".to_string(), "pull_request".to_string()],
                },
            )
            .await
            .unwrap();

        assert_eq!(hook.id, 77);
    }
}
