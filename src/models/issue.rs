//! Issue entity model
//!
//! Local mirror of provider issues. Records created locally before their
//! first push carry no remote identity; the outbound dispatcher fills in
//! `remote_id`, `remote_node_id` and `remote_url` from the create response.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Issue status values stored in `status`.
pub const ISSUE_STATUS_BACKLOG: &str = "backlog";
pub const ISSUE_STATUS_CLOSED: &str = "closed";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "issues")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub repo_id: Uuid,

    pub title: String,

    pub body: Option<String>,

    /// Local workflow status; remote "open" maps to backlog
    pub status: String,

    /// Provider login of the author
    pub author: String,

    /// Label names as a JSON array of strings
    #[sea_orm(column_type = "JsonBinary")]
    pub labels: JsonValue,

    /// Provider-side issue number
    pub remote_id: Option<i64>,

    pub remote_node_id: Option<String>,

    pub remote_url: Option<String>,

    pub last_synced_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::repo::Entity",
        from = "Column::RepoId",
        to = "super::repo::Column::Id"
    )]
    Repo,
    #[sea_orm(has_many = "super::comment::Entity")]
    Comment,
}

impl Related<super::repo::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Repo.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
