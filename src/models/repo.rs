//! Repository entity model
//!
//! This module contains the SeaORM entity model for the repos table, the
//! local identity of each mirrored repository along with its sync flags
//! and webhook credentials.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Sync status values stored in `sync_status`.
pub const SYNC_STATUS_IDLE: &str = "idle";
pub const SYNC_STATUS_SYNCING: &str = "syncing";
pub const SYNC_STATUS_ERROR: &str = "error";

/// Repository entity representing a mirrored remote repository
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "repos")]
pub struct Model {
    /// Unique identifier for the repository (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Provider-side numeric repository id
    pub remote_id: i64,

    /// Repository owner login on the provider
    pub owner: String,

    /// Repository name on the provider
    pub name: String,

    /// Default branch, used for content fetches
    pub default_branch: String,

    /// Whether outbound push is enabled for this repository
    pub sync_enabled: bool,

    /// Advisory sync status: idle, syncing or error
    pub sync_status: String,

    /// Timestamp of the last completed full sync
    pub last_synced_at: Option<DateTimeWithTimeZone>,

    /// Provider-side webhook id once registered
    pub webhook_id: Option<i64>,

    /// Shared secret for inbound webhook signature verification
    pub webhook_secret: Option<String>,

    /// Per-repository provider access token
    pub access_token: Option<String>,

    /// Timestamp when the record was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the record was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::issue::Entity")]
    Issue,
    #[sea_orm(has_many = "super::pull_request::Entity")]
    PullRequest,
    #[sea_orm(has_many = "super::cached_file::Entity")]
    CachedFile,
}

impl Related<super::issue::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Issue.def()
    }
}

impl Related<super::pull_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PullRequest.def()
    }
}

impl Related<super::cached_file::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CachedFile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Owner/name slug used when building provider API paths.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}
