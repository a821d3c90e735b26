//! # Delivery Repository
//!
//! The webhook delivery ledger. Recording a delivery is an insert against
//! a unique `delivery_id`; a duplicate key means the delivery was already
//! processed and the event must not be applied again.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::error::is_unique_violation;
use crate::models::webhook_delivery::{ActiveModel, Column, Entity as WebhookDelivery, Model};

/// Repository for webhook delivery database operations
pub struct DeliveryRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> DeliveryRepository<'a> {
    /// Create a new DeliveryRepository with the given database connection
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_delivery_id(
        &self,
        delivery_id: &str,
    ) -> Result<Option<Model>, sea_orm::DbErr> {
        WebhookDelivery::find()
            .filter(Column::DeliveryId.eq(delivery_id))
            .one(self.db)
            .await
    }

    /// Record a delivery. Returns true when this is the first time the
    /// delivery id was seen, false when it is a redelivery.
    pub async fn record(
        &self,
        delivery_id: &str,
        repo_id: Option<Uuid>,
        event: &str,
        action: Option<&str>,
    ) -> Result<bool, sea_orm::DbErr> {
        let active = ActiveModel {
            id: Set(Uuid::new_v4()),
            delivery_id: Set(delivery_id.to_string()),
            repo_id: Set(repo_id),
            event: Set(event.to_string()),
            action: Set(action.map(str::to_string)),
            received_at: Set(Utc::now().into()),
        };

        match active.insert(self.db).await {
            Ok(_) => Ok(true),
            Err(err) if is_unique_violation(&err) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Remove a recorded delivery so the provider's retry can be applied.
    /// Used when event application fails after the ledger insert.
    pub async fn forget(&self, delivery_id: &str) -> Result<(), sea_orm::DbErr> {
        WebhookDelivery::delete_many()
            .filter(Column::DeliveryId.eq(delivery_id))
            .exec(self.db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support::{insert_repo, setup_db};

    #[tokio::test]
    async fn test_record_first_delivery_returns_true() {
        let db = setup_db().await;
        let repo = insert_repo(&db, 1).await;
        let ledger = DeliveryRepository::new(&db);

        let fresh = ledger
            .record("d1", Some(repo.id), "issues", Some("opened"))
            .await
            .unwrap();
        assert!(fresh);

        let stored = ledger.find_by_delivery_id("d1").await.unwrap().unwrap();
        assert_eq!(stored.event, "issues");
        assert_eq!(stored.action.as_deref(), Some("opened"));
    }

    #[tokio::test]
    async fn test_record_duplicate_delivery_returns_false() {
        let db = setup_db().await;
        let repo = insert_repo(&db, 2).await;
        let ledger = DeliveryRepository::new(&db);

        assert!(
            ledger
                .record("d1", Some(repo.id), "issues", Some("opened"))
                .await
                .unwrap()
        );
        assert!(
            !ledger
                .record("d1", Some(repo.id), "issues", Some("opened"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_forget_allows_reprocessing() {
        let db = setup_db().await;
        let ledger = DeliveryRepository::new(&db);

        assert!(ledger.record("d2", None, "ping", None).await.unwrap());
        ledger.forget("d2").await.unwrap();
        assert!(ledger.record("d2", None, "ping", None).await.unwrap());
    }
}
