//! # Inbound Event Processing
//!
//! Applies verified webhook events to the local mirror. Payload shapes
//! reuse the provider wire types; every apply is an upsert keyed on the
//! remote identity so redeliveries and out-of-order events converge.

use sea_orm::DatabaseConnection;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::repo;
use crate::provider::types::{RemoteComment, RemoteIssue, RemotePull};
use crate::repositories::{CommentRepository, IssueRepository, PullRequestRepository};
use crate::sync::{SyncFailure, local_issue_status};

#[derive(Debug, Deserialize)]
struct IssueEventPayload {
    action: String,
    issue: RemoteIssue,
}

#[derive(Debug, Deserialize)]
struct PullEventPayload {
    action: String,
    pull_request: RemotePull,
}

#[derive(Debug, Deserialize)]
struct CommentEventPayload {
    action: String,
    issue: RemoteIssue,
    comment: RemoteComment,
}

/// What happened to an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// The event changed local state.
    Applied { event_type: String },
    /// The event was acknowledged without changing state.
    Ignored { event_type: String },
}

impl InboundOutcome {
    pub fn event_type(&self) -> &str {
        match self {
            Self::Applied { event_type } | Self::Ignored { event_type } => event_type,
        }
    }
}

/// Applies webhook events to the local database.
pub struct InboundProcessor<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> InboundProcessor<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Apply one verified event. Unknown events and delete actions are
    /// acknowledged without touching local state.
    pub async fn apply(
        &self,
        repo: &repo::Model,
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<InboundOutcome, SyncFailure> {
        match event {
            "ping" => Ok(InboundOutcome::Ignored {
                event_type: "ping".to_string(),
            }),
            "issues" => self.apply_issue_event(repo, payload).await,
            "pull_request" => self.apply_pull_event(repo, payload).await,
            "issue_comment" => self.apply_comment_event(repo, payload).await,
            other => {
                debug!(event = other, "Ignoring unhandled webhook event");
                Ok(InboundOutcome::Ignored {
                    event_type: other.to_string(),
                })
            }
        }
    }

    async fn apply_issue_event(
        &self,
        repo: &repo::Model,
        payload: &serde_json::Value,
    ) -> Result<InboundOutcome, SyncFailure> {
        let event: IssueEventPayload = serde_json::from_value(payload.clone())?;
        let event_type = format!("issue_{}", event.action);

        if event.action == "deleted" {
            // Remote deletions are recorded but never propagated; local
            // history is kept.
            warn!(
                repo = %repo.full_name(),
                number = event.issue.number,
                "Remote issue deleted, keeping local record"
            );
            return Ok(InboundOutcome::Ignored { event_type });
        }

        let issues = IssueRepository::new(self.db);
        let existing = issues.find_by_remote(repo.id, event.issue.number).await?;
        let status = local_issue_status(
            &event.issue.state,
            existing.as_ref().map(|m| m.status.as_str()),
        );
        issues.upsert_remote(repo.id, &event.issue, &status).await?;
        metrics::counter!("sync_inbound_events_total", "event" => "issues").increment(1);

        Ok(InboundOutcome::Applied { event_type })
    }

    async fn apply_pull_event(
        &self,
        repo: &repo::Model,
        payload: &serde_json::Value,
    ) -> Result<InboundOutcome, SyncFailure> {
        let event: PullEventPayload = serde_json::from_value(payload.clone())?;
        let event_type = format!("pull_request_{}", event.action);

        let pulls = PullRequestRepository::new(self.db);
        pulls.upsert_remote(repo.id, &event.pull_request).await?;
        metrics::counter!("sync_inbound_events_total", "event" => "pull_request").increment(1);

        Ok(InboundOutcome::Applied { event_type })
    }

    async fn apply_comment_event(
        &self,
        repo: &repo::Model,
        payload: &serde_json::Value,
    ) -> Result<InboundOutcome, SyncFailure> {
        let event: CommentEventPayload = serde_json::from_value(payload.clone())?;
        let event_type = format!("issue_comment_{}", event.action);

        if event.action == "deleted" {
            return Ok(InboundOutcome::Ignored { event_type });
        }

        let comments = CommentRepository::new(self.db);

        // The issue field carries the pull request marker when the comment
        // sits on a pull request.
        if event.issue.is_pull_request() {
            let pulls = PullRequestRepository::new(self.db);
            let Some(parent) = pulls.find_by_remote(repo.id, event.issue.number).await? else {
                warn!(
                    repo = %repo.full_name(),
                    number = event.issue.number,
                    "Comment for unknown pull request, skipping"
                );
                return Ok(InboundOutcome::Ignored { event_type });
            };
            comments
                .upsert_remote_on_pull(parent.id, &event.comment)
                .await?;
        } else {
            let issues = IssueRepository::new(self.db);
            let Some(parent) = issues.find_by_remote(repo.id, event.issue.number).await? else {
                warn!(
                    repo = %repo.full_name(),
                    number = event.issue.number,
                    "Comment for unknown issue, skipping"
                );
                return Ok(InboundOutcome::Ignored { event_type });
            };
            comments
                .upsert_remote_on_issue(parent.id, &event.comment)
                .await?;
        }
        metrics::counter!("sync_inbound_events_total", "event" => "issue_comment").increment(1);

        Ok(InboundOutcome::Applied { event_type })
    }
}
