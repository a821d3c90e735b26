//! # Data Models
//!
//! This module contains the SeaORM entities for the mirrored data model.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod cached_file;
pub mod comment;
pub mod issue;
pub mod pull_request;
pub mod repo;
pub mod sync_log_entry;
pub mod webhook_delivery;

pub use cached_file::Entity as CachedFile;
pub use comment::Entity as Comment;
pub use issue::Entity as Issue;
pub use pull_request::Entity as PullRequest;
pub use repo::Entity as Repo;
pub use sync_log_entry::Entity as SyncLogEntry;
pub use webhook_delivery::Entity as WebhookDelivery;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "repomirror".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
