//! Shipment Repository
//!
//! Shipments are created by fulfillment when a label is bought (outside this
//! service); afterwards the reconciler is the only writer.

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::{Shipment, ShipmentStatus, TrackingEvent};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

const TABLE: &str = "shipment";

/// Field overwrite applied after a successful carrier poll
#[derive(Debug, Serialize)]
pub struct TrackingPatch {
    pub status: ShipmentStatus,
    pub tracking_events: Vec<TrackingEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_delivery: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_delivery: Option<DateTime<Utc>>,
    pub last_tracking_update: DateTime<Utc>,
    /// Reset to zero whenever the carrier knows the number again
    pub not_found_count: u32,
}

#[derive(Clone)]
pub struct ShipmentRepository {
    base: BaseRepository,
}

impl ShipmentRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Find a shipment by record id
    pub async fn find_by_id(&self, id: &RecordId) -> RepoResult<Option<Shipment>> {
        let shipment: Option<Shipment> = self.base.db().select(id.clone()).await?;
        Ok(shipment)
    }

    /// Shipments still in a non-terminal state with a usable tracking number
    pub async fn find_active(&self) -> RepoResult<Vec<Shipment>> {
        let statuses: Vec<String> = ShipmentStatus::ACTIVE
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        let mut result = self
            .base
            .db()
            .query(
                "SELECT * FROM shipment \
                 WHERE status IN $statuses AND tracking_number != ''",
            )
            .bind(("statuses", statuses))
            .await?;
        let shipments: Vec<Shipment> = result.take(0)?;
        Ok(shipments)
    }

    /// Overwrite tracking state after a successful carrier poll
    pub async fn apply_tracking(&self, id: &RecordId, patch: TrackingPatch) -> RepoResult<()> {
        let updated: Option<Shipment> = self.base.db().update(id.clone()).merge(patch).await?;
        if updated.is_none() {
            return Err(RepoError::NotFound(format!("Shipment {} not found", id)));
        }
        Ok(())
    }

    /// Bump the consecutive "not found" counter, returning the new value
    pub async fn record_not_found(&self, id: &RecordId, now: DateTime<Utc>) -> RepoResult<u32> {
        #[derive(Debug, Serialize)]
        struct NotFoundPatch {
            not_found_count: u32,
            last_tracking_update: DateTime<Utc>,
        }

        let current = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Shipment {} not found", id)))?;
        let count = current.not_found_count.saturating_add(1);
        let _: Option<Shipment> = self
            .base
            .db()
            .update(id.clone())
            .merge(NotFoundPatch {
                not_found_count: count,
                last_tracking_update: now,
            })
            .await?;
        Ok(count)
    }

    /// Insert a shipment (test fixtures; production rows are created by fulfillment)
    pub async fn create(&self, shipment: Shipment) -> RepoResult<Shipment> {
        let created: Option<Shipment> = self.base.db().create(TABLE).content(shipment).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create shipment".to_string()))
    }
}
