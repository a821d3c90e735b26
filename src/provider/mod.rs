//! Remote provider API abstraction
//!
//! Defines the [`ProviderApi`] trait covering every remote call the sync
//! engine makes, the structured [`SyncError`] taxonomy for provider-call
//! failures, and the GitHub-shaped HTTP implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;

pub mod github;
pub mod types;

pub use github::GitHubProvider;
use types::{
    ContentEntry, IssueUpdate, NewComment, NewIssue, NewPull, NewWebhook, RemoteBranch,
    RemoteComment, RemoteCommit, RemoteFile, RemoteIssue, RemotePull, RemoteRepo, RemoteUser,
    RemoteWebhook,
};

/// Structured error for provider calls, classified for retry handling.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SyncError {
    #[serde(flatten)]
    pub kind: SyncErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncErrorKind {
    /// Authentication/authorization failure
    Unauthorized,
    /// Rate limited with optional retry after hint
    RateLimited {
        #[serde(skip_serializing_if = "Option::is_none")]
        retry_after_secs: Option<u64>,
    },
    /// Transient/retryable error
    Transient,
    /// Permanent/non-retryable error
    Permanent,
}

impl SyncError {
    pub fn unauthorized<S: Into<String>>(message: S) -> Self {
        Self {
            kind: SyncErrorKind::Unauthorized,
            message: Some(message.into()),
            details: None,
        }
    }

    pub fn rate_limited(retry_after_secs: Option<u64>) -> Self {
        Self {
            kind: SyncErrorKind::RateLimited { retry_after_secs },
            message: None,
            details: None,
        }
    }

    pub fn transient<S: Into<String>>(message: S) -> Self {
        Self {
            kind: SyncErrorKind::Transient,
            message: Some(message.into()),
            details: None,
        }
    }

    pub fn permanent<S: Into<String>>(message: S) -> Self {
        Self {
            kind: SyncErrorKind::Permanent,
            message: Some(message.into()),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Whether a retry can reasonably succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            SyncErrorKind::Transient | SyncErrorKind::RateLimited { .. }
        )
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            SyncErrorKind::Unauthorized => {
                write!(f, "Unauthorized")?;
                if let Some(msg) = &self.message {
                    write!(f, ": {}", msg)?;
                }
            }
            SyncErrorKind::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited")?;
                if let Some(after) = retry_after_secs {
                    write!(f, " (retry after: {}s)", after)?;
                }
                if let Some(msg) = &self.message {
                    write!(f, ": {}", msg)?;
                }
            }
            SyncErrorKind::Transient => {
                write!(f, "Transient error")?;
                if let Some(msg) = &self.message {
                    write!(f, ": {}", msg)?;
                }
            }
            SyncErrorKind::Permanent => {
                write!(f, "Permanent error")?;
                if let Some(msg) = &self.message {
                    write!(f, ": {}", msg)?;
                }
            }
        }
        Ok(())
    }
}

impl std::error::Error for SyncError {}

/// Remote provider REST surface used by the sync engine.
///
/// Implementations authenticate each call with the token passed in; the
/// caller resolves the per-repository credential.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Fetch the user the token authenticates as.
    async fn current_user(&self, token: &str) -> Result<RemoteUser, SyncError>;

    /// Fetch a repository by owner and name.
    async fn get_repo(&self, token: &str, owner: &str, name: &str)
    -> Result<RemoteRepo, SyncError>;

    /// List issues for a repository, one page at a time. Interleaved pull
    /// requests carry the `pull_request` marker and must be filtered by
    /// the caller.
    async fn list_issues(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        state: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RemoteIssue>, SyncError>;

    /// List pull requests for a repository, one page at a time.
    async fn list_pulls(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        state: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RemotePull>, SyncError>;

    /// Create an issue.
    async fn create_issue(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        issue: &NewIssue,
    ) -> Result<RemoteIssue, SyncError>;

    /// Update an existing issue by number.
    async fn update_issue(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        number: i64,
        update: &IssueUpdate,
    ) -> Result<RemoteIssue, SyncError>;

    /// Create a pull request.
    async fn create_pull(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        pull: &NewPull,
    ) -> Result<RemotePull, SyncError>;

    /// Create a comment on an issue (or pull request) by number.
    async fn create_issue_comment(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        issue_number: i64,
        comment: &NewComment,
    ) -> Result<RemoteComment, SyncError>;

    /// Register a webhook on the repository.
    async fn create_webhook(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        hook: &NewWebhook,
    ) -> Result<RemoteWebhook, SyncError>;

    /// List the entries of a directory at the given ref.
    async fn get_contents(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<Vec<ContentEntry>, SyncError>;

    /// Fetch a single file at the given ref. Content may be omitted by
    /// the provider for large files; fall back to [`Self::get_blob`].
    async fn get_file(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<RemoteFile, SyncError>;

    /// Fetch raw blob content by hash.
    async fn get_blob(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        sha: &str,
    ) -> Result<RemoteFile, SyncError>;

    /// Fetch the repository readme.
    async fn get_readme(&self, token: &str, owner: &str, name: &str)
    -> Result<RemoteFile, SyncError>;

    /// Fetch language byte counts.
    async fn get_languages(
        &self,
        token: &str,
        owner: &str,
        name: &str,
    ) -> Result<BTreeMap<String, i64>, SyncError>;

    /// List branches, one page at a time.
    async fn list_branches(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RemoteBranch>, SyncError>;

    /// List commits on the default branch, one page at a time.
    async fn list_commits(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RemoteCommit>, SyncError>;
}
