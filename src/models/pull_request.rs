//! Pull request entity model

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Pull request status values stored in `status`.
pub const PULL_STATUS_OPEN: &str = "open";
pub const PULL_STATUS_CLOSED: &str = "closed";
pub const PULL_STATUS_MERGED: &str = "merged";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "pull_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub repo_id: Uuid,

    pub title: String,

    pub body: Option<String>,

    /// open, closed or merged; merged takes precedence over closed
    pub status: String,

    pub head_branch: String,

    pub base_branch: String,

    /// Provider-side pull request number
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
