//! Wire types for the remote provider REST API.
//!
//! Deserialization targets for provider responses and request bodies for
//! outbound calls. Webhook payloads reuse the same response shapes.

use serde::{Deserialize, Serialize};

use super::SyncError;

/// Provider user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub id: i64,
    pub login: String,
}

/// Issue or pull request label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteLabel {
    pub name: String,
}

/// Push/pull permission flags on a repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePermissions {
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub push: bool,
    #[serde(default)]
    pub pull: bool,
}

/// Provider repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRepo {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub owner: RemoteUser,
    pub default_branch: String,
    #[serde(default)]
    pub permissions: Option<RemotePermissions>,
}

/// Marker present on issue records that are actually pull requests.
///
/// The issues listing endpoint interleaves pull requests; their presence
/// is detected by this field alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestMarker {
    #[serde(default)]
    pub url: Option<String>,
}

/// Provider issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteIssue {
    pub id: i64,
    pub node_id: String,
    pub number: i64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    pub user: RemoteUser,
    #[serde(default)]
    pub labels: Vec<RemoteLabel>,
    pub html_url: String,
    #[serde(default)]
    pub pull_request: Option<PullRequestMarker>,
}

impl RemoteIssue {
    /// True when this record is a pull request surfaced by the issues
    /// listing endpoint.
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// Branch reference on a pull request (head or base)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteGitRef {
    #[serde(rename = "ref")]
    pub git_ref: String,
}

/// Provider pull request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePull {
    pub id: i64,
    pub node_id: String,
    pub number: i64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    #[serde(default)]
    pub merged_at: Option<String>,
    pub user: RemoteUser,
    pub head: RemoteGitRef,
    pub base: RemoteGitRef,
    pub html_url: String,
}

impl RemotePull {
    /// Local status for this pull request; merged takes precedence over
    /// the closed state.
    pub fn local_status(&self) -> &'static str {
        if self.merged_at.is_some() {
            crate::models::pull_request::PULL_STATUS_MERGED
        } else if self.state == "closed" {
            crate::models::pull_request::PULL_STATUS_CLOSED
        } else {
            crate::models::pull_request::PULL_STATUS_OPEN
        }
    }
}

/// Provider issue/pull comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteComment {
    pub id: i64,
    pub body: String,
    pub user: RemoteUser,
    pub html_url: String,
}

/// Directory listing entry from the contents endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    pub sha: String,
    #[serde(default)]
    pub size: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ContentEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == "dir"
    }

    pub fn is_file(&self) -> bool {
        self.kind == "file"
    }
}

/// File or blob response carrying base64 content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    pub sha: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

impl RemoteFile {
    /// Decode the inline base64 content.
    ///
    /// Returns `Ok(None)` when the provider omitted inline content (files
    /// above its inline size limit report `encoding: "none"`); the caller
    /// falls back to the blob endpoint.
    pub fn decoded_content(&self) -> Result<Option<Vec<u8>>, SyncError> {
        use base64::{Engine as _, engine::general_purpose};

        let Some(content) = &self.content else {
            return Ok(None);
        };

        match self.encoding.as_deref() {
            Some("base64") | None => {
                // The provider wraps base64 content at 60 columns.
                let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
                let bytes = general_purpose::STANDARD.decode(compact).map_err(|e| {
                    SyncError::permanent(format!("invalid base64 file content: {}", e))
                })?;
                Ok(Some(bytes))
            }
            Some("none") => Ok(None),
            Some(other) => Err(SyncError::permanent(format!(
                "unsupported content encoding: {}",
                other
            ))),
        }
    }
}

/// Registered webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteWebhook {
    pub id: i64,
}

/// Branch listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteBranch {
    pub name: String,
    pub commit: CommitRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

/// Commit listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCommit {
    pub sha: String,
    pub commit: CommitInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub message: String,
}

/// Request body for issue creation
#[derive(Debug, Clone, Serialize)]
pub struct NewIssue {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

/// Request body for issue updates; unset fields are left untouched
#[derive(Debug, Clone, Default, Serialize)]
pub struct IssueUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

/// Request body for pull request creation
#[derive(Debug, Clone, Serialize)]
pub struct NewPull {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub head: String,
    pub base: String,
}

/// Request body for comment creation
#[derive(Debug, Clone, Serialize)]
pub struct NewComment {
    pub body: String,
}

/// Webhook registration parameters
#[derive(Debug, Clone)]
pub struct NewWebhook {
    pub url: String,
    pub secret: String,
    pub events: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_request_marker_detection() {
        let issue: RemoteIssue = serde_json::from_value(serde_json::json!({
            "id": 1, "node_id": "I_1", "number": 7, "title": "t",
            "state": "open", "user": {"id": 1, "login": "octocat"},
            "html_url": "https://example.test/i/7",
            "pull_request": {"url": "https://example.test/p/7"}
        }))
        .unwrap();
        assert!(issue.is_pull_request());

        let plain: RemoteIssue = serde_json::from_value(serde_json::json!({
            "id": 2, "node_id": "I_2", "number": 8, "title": "t",
            "state": "open", "user": {"id": 1, "login": "octocat"},
            "html_url": "https://example.test/i/8"
        }))
        .unwrap();
        assert!(!plain.is_pull_request());
    }

    #[test]
    fn test_pull_local_status_merged_precedence() {
        let pull = RemotePull {
            id: 1,
            node_id: "PR_1".to_string(),
            number: 3,
            title: "t".to_string(),
            body: None,
            state: "closed".to_string(),
            merged_at: Some("2026-01-01T00:00:00Z".to_string()),
            user: RemoteUser {
                id: 1,
                login: "octocat".to_string(),
            },
            head: RemoteGitRef {
                git_ref: "feature".to_string(),
            },
            base: RemoteGitRef {
                git_ref: "main".to_string(),
            },
            html_url: "https://example.test/p/3".to_string(),
        };

        assert_eq!(pull.local_status(), "merged");
    }

    #[test]
    fn test_decoded_content_wrapped_base64() {
        let file = RemoteFile {
            name: None,
            path: Some("README.md".to_string()),
            sha: "abc".to_string(),
            size: 11,
            // "hello world" split across wrapped lines
            content: Some("aGVsbG8g\nd29ybGQ=\n".to_string()),
            encoding: Some("base64".to_string()),
        };

        let bytes = file.decoded_content().unwrap().unwrap();
        assert_eq!(bytes, b"hello world");
    }

    #[test]
    fn test_decoded_content_omitted_for_large_files() {
        let file = RemoteFile {
            name: None,
            path: Some("big.bin".to_string()),
            sha: "abc".to_string(),
            size: 5_000_000,
            content: Some(String::new()),
            encoding: Some("none".to_string()),
        };

        assert_eq!(file.decoded_content().unwrap(), None);
    }
}
