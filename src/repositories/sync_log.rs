//! # Sync Log Repository
//!
//! Append-only audit trail for sync activity. Entries are never updated
//! or deleted by the application.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::sync_log_entry::{ActiveModel, Column, Entity as SyncLogEntry, Model};

/// Repository for sync log database operations
pub struct SyncLogRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> SyncLogRepository<'a> {
    /// Create a new SyncLogRepository with the given database connection
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Append an entry to the log.
    pub async fn append(
        &self,
        repo_id: Option<Uuid>,
        event_type: &str,
        direction: &str,
        success: bool,
        error: Option<&str>,
        payload: Option<JsonValue>,
    ) -> Result<Model, sea_orm::DbErr> {
        let active = ActiveModel {
            id: Set(Uuid::new_v4()),
            repo_id: Set(repo_id),
            event_type: Set(event_type.to_string()),
            direction: Set(direction.to_string()),
            success: Set(success),
            error: Set(error.map(str::to_string)),
            payload: Set(payload),
            created_at: Set(Utc::now().into()),
        };
        active.insert(self.db).await
    }

    /// Newest-first slice of the log for one repository.
    pub async fn list_recent(
        &self,
        repo_id: Uuid,
        limit: u64,
    ) -> Result<Vec<Model>, sea_orm::DbErr> {
        SyncLogEntry::find()
            .filter(Column::RepoId.eq(repo_id))
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .limit(limit)
            .all(self.db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sync_log_entry::{DIRECTION_INBOUND, DIRECTION_OUTBOUND};
    use crate::repositories::test_support::{insert_repo, setup_db};

    #[tokio::test]
    async fn test_append_and_list_recent_newest_first() {
        let db = setup_db().await;
        let repo = insert_repo(&db, 1).await;
        let log = SyncLogRepository::new(&db);

        log.append(
            Some(repo.id),
            "issue_opened",
            DIRECTION_INBOUND,
            true,
            None,
            Some(serde_json::json!({"number": 7})),
        )
        .await
        .unwrap();
        log.append(
            Some(repo.id),
            "push_issue_create",
            DIRECTION_OUTBOUND,
            false,
            Some("rate limited"),
            None,
        )
        .await
        .unwrap();

        let entries = log.list_recent(repo.id, 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event_type, "push_issue_create");
        assert!(!entries[0].success);
        assert_eq!(entries[0].error.as_deref(), Some("rate limited"));
        assert_eq!(entries[1].event_type, "issue_opened");
    }

    #[tokio::test]
    async fn test_list_recent_respects_limit_and_repo_scope() {
        let db = setup_db().await;
        let repo_a = insert_repo(&db, 1).await;
        let repo_b = insert_repo(&db, 2).await;
        let log = SyncLogRepository::new(&db);

        for i in 0..5 {
            log.append(
                Some(repo_a.id),
                &format!("event_{}", i),
                DIRECTION_INBOUND,
                true,
                None,
                None,
            )
            .await
            .unwrap();
        }
        log.append(Some(repo_b.id), "other", DIRECTION_INBOUND, true, None, None)
            .await
            .unwrap();

        let entries = log.list_recent(repo_a.id, 3).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.repo_id == Some(repo_a.id)));
    }
}
