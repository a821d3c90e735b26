//! # Webhook Handler
//!
//! Receives provider webhook deliveries on `POST /provider/webhook`.
//!
//! The body is parsed just far enough to find `repository.id` so the
//! repository's own secret can be looked up; the signature is then
//! verified over the exact raw bytes before any event is applied. The
//! delivery ledger insert makes processing exactly-once-effective across
//! provider redeliveries.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use crate::error::{ApiError, unauthorized, validation_error};
use crate::models::sync_log_entry::DIRECTION_INBOUND;
use crate::repositories::{DeliveryRepository, RepoRepository, SyncLogRepository};
use crate::server::AppState;
use crate::sync::inbound::{InboundOutcome, InboundProcessor};
use crate::webhook_verification::verify_signature;

/// Webhook processing response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookResponse {
    /// applied, ignored or already_processed
    pub status: String,
}

impl WebhookResponse {
    fn applied() -> Self {
        Self {
            status: "applied".to_string(),
        }
    }

    fn ignored() -> Self {
        Self {
            status: "ignored".to_string(),
        }
    }

    fn already_processed() -> Self {
        Self {
            status: "already_processed".to_string(),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    headers
        .get(name)
        .ok_or_else(|| {
            validation_error(
                "Missing required header",
                serde_json::json!({ "header": name }),
            )
        })?
        .to_str()
        .map_err(|_| {
            validation_error(
                "Invalid header encoding",
                serde_json::json!({ "header": name }),
            )
        })
}

/// Receive a webhook delivery from the remote provider
///
/// The request must carry `X-Event` and `X-Delivery` headers and an
/// `X-Signature-256` HMAC over the raw body, keyed with the secret
/// agreed at webhook registration. Redelivered delivery ids are
/// acknowledged without being applied again.
#[utoipa::path(
    post,
    path = "/provider/webhook",
    params(
        ("X-Event" = String, Header, description = "Event name, e.g. issues"),
        ("X-Delivery" = String, Header, description = "Provider-unique delivery id"),
        ("X-Signature-256" = String, Header, description = "HMAC-SHA256 of the body, sha256=<hex>")
    ),
    request_body(content = serde_json::Value, description = "Event payload", content_type = "application/json"),
    responses(
        (status = 200, description = "Delivery processed or acknowledged", body = WebhookResponse),
        (status = 400, description = "Missing headers or malformed payload", body = ApiError),
        (status = 401, description = "Signature verification failed", body = ApiError),
        (status = 404, description = "Unknown repository", body = ApiError),
        (status = 500, description = "Event application failed; safe to redeliver", body = ApiError)
    ),
    tag = "webhooks"
)]
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookResponse>), ApiError> {
    let event = header_str(&headers, "X-Event")?.to_string();
    let delivery_id = header_str(&headers, "X-Delivery")?.to_string();

    debug!(event = %event, delivery_id = %delivery_id, "Processing webhook delivery");

    // Parse only far enough to find the repository; verification decides
    // whether the rest of the payload can be trusted.
    let payload: serde_json::Value = serde_json::from_slice(&body).map_err(|_| {
        validation_error(
            "Request body is not valid JSON",
            serde_json::json!({ "body": "invalid JSON" }),
        )
    })?;
    let remote_repo_id = payload
        .get("repository")
        .and_then(|r| r.get("id"))
        .and_then(|id| id.as_i64())
        .ok_or_else(|| {
            validation_error(
                "Payload is missing repository.id",
                serde_json::json!({ "repository.id": "required" }),
            )
        })?;

    let repos = RepoRepository::new(&state.db);
    let repo = repos.find_by_remote_id(remote_repo_id).await?.ok_or_else(|| {
        info!(remote_repo_id, "Webhook for unknown repository");
        ApiError::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "repository is not linked",
        )
    })?;

    let Some(secret) = repo.webhook_secret.as_deref() else {
        warn!(repo = %repo.full_name(), "Repository has no webhook secret");
        return Err(unauthorized(Some("Webhook verification not configured")));
    };
    let signature = headers
        .get("X-Signature-256")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    verify_signature(&body, signature, secret).map_err(|e| {
        warn!(repo = %repo.full_name(), error = %e, "Webhook signature rejected");
        unauthorized(Some("Invalid webhook signature"))
    })?;

    // Acknowledged but never applied while sync is paused. The ledger is
    // left untouched so a redelivery after re-enabling still goes through.
    if !repo.sync_enabled {
        info!(repo = %repo.full_name(), delivery_id = %delivery_id, "Sync disabled, ignoring delivery");
        metrics::counter!("webhook_deliveries_total", "outcome" => "sync_disabled").increment(1);
        return Ok((StatusCode::OK, Json(WebhookResponse::ignored())));
    }

    let action = payload
        .get("action")
        .and_then(|a| a.as_str())
        .map(str::to_string);

    let ledger = DeliveryRepository::new(&state.db);
    let fresh = ledger
        .record(&delivery_id, Some(repo.id), &event, action.as_deref())
        .await?;
    if !fresh {
        debug!(delivery_id = %delivery_id, "Duplicate delivery, acknowledging without reapply");
        metrics::counter!("webhook_deliveries_total", "outcome" => "duplicate").increment(1);
        return Ok((StatusCode::OK, Json(WebhookResponse::already_processed())));
    }

    let processor = InboundProcessor::new(&state.db);
    let log = SyncLogRepository::new(&state.db);

    match processor.apply(&repo, &event, &payload).await {
        Ok(outcome) => {
            let event_type = outcome.event_type().to_string();
            if let Err(err) = log
                .append(
                    Some(repo.id),
                    &event_type,
                    DIRECTION_INBOUND,
                    true,
                    None,
                    Some(serde_json::json!({ "delivery_id": delivery_id })),
                )
                .await
            {
                warn!(error = %err, "Failed to record inbound sync log entry");
            }
            metrics::counter!("webhook_deliveries_total", "outcome" => "processed").increment(1);

            let response = match outcome {
                InboundOutcome::Applied { .. } => WebhookResponse::applied(),
                InboundOutcome::Ignored { .. } => WebhookResponse::ignored(),
            };
            Ok((StatusCode::OK, Json(response)))
        }
        Err(err) => {
            error!(
                repo = %repo.full_name(),
                delivery_id = %delivery_id,
                error = %err,
                "Failed to apply webhook event"
            );
            // Drop the ledger row so the provider's redelivery gets a
            // clean attempt.
            if let Err(forget_err) = ledger.forget(&delivery_id).await {
                error!(error = %forget_err, "Failed to release delivery ledger entry");
            }
            if let Err(log_err) = log
                .append(
                    Some(repo.id),
                    &event,
                    DIRECTION_INBOUND,
                    false,
                    Some(&err.to_string()),
                    Some(serde_json::json!({ "delivery_id": delivery_id })),
                )
                .await
            {
                warn!(error = %log_err, "Failed to record inbound failure log entry");
            }
            metrics::counter!("webhook_deliveries_total", "outcome" => "failed").increment(1);

            Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "Failed to apply webhook event",
            ))
        }
    }
}
