//! Carrier Tracking Adapter
//!
//! Isolates everything vendor-specific: status vocabulary mapping, timestamp
//! normalization, event ordering. The reconciler only ever sees normalized
//! [`TrackingResult`] values in the internal vocabulary.

pub mod dhl;
pub mod status;

pub use dhl::DhlClient;
pub use status::map_vendor_status;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{ShipmentStatus, TrackingEvent};

/// Normalized tracking state for one shipment
#[derive(Debug, Clone)]
pub struct TrackingResult {
    pub tracking_number: String,
    /// Mapped into the internal vocabulary
    pub status: ShipmentStatus,
    /// Raw vendor status code, kept for logs
    pub vendor_status_code: String,
    /// "Locality, CC"
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    /// Newest event timestamp when the vendor reports delivered
    pub actual_delivery: Option<DateTime<Utc>>,
    /// Sorted newest-first regardless of vendor order
    pub events: Vec<TrackingEvent>,
}

/// Outcome of one tracking call
///
/// `NotFound` 与 `Unavailable` 必须区分：前者是运营商明确不认识这个
/// 单号（计数、超阈值告警），后者是暂时性故障（下个周期重试）。
#[derive(Debug, Clone)]
pub enum TrackOutcome {
    Found(TrackingResult),
    NotFound,
    Unavailable,
}

/// Seam between the reconciler and the vendor API
#[async_trait]
pub trait CarrierTracker: Send + Sync {
    /// Poll the carrier once; never retries, never returns an error
    async fn track(&self, tracking_number: &str) -> TrackOutcome;
}
