//! Shipment Model
//!
//! 与订单一对一。状态由运营商上报驱动，协调器是唯一写入方。

use super::serde_helpers;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// Shipment status
///
/// delivered / failed / returned 为终态，不再参与轮询。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    LabelCreated,
    PickedUp,
    InTransit,
    OutForDelivery,
    Delivered,
    Failed,
    Returned,
}

impl ShipmentStatus {
    /// 非终态集合 — 轮询的筛选条件
    pub const ACTIVE: [ShipmentStatus; 4] = [
        ShipmentStatus::LabelCreated,
        ShipmentStatus::PickedUp,
        ShipmentStatus::InTransit,
        ShipmentStatus::OutForDelivery,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ShipmentStatus::Delivered | ShipmentStatus::Failed | ShipmentStatus::Returned
        )
    }

    /// Storage representation, e.g. "in_transit"
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::LabelCreated => "label_created",
            ShipmentStatus::PickedUp => "picked_up",
            ShipmentStatus::InTransit => "in_transit",
            ShipmentStatus::OutForDelivery => "out_for_delivery",
            ShipmentStatus::Delivered => "delivered",
            ShipmentStatus::Failed => "failed",
            ShipmentStatus::Returned => "returned",
        }
    }
}

/// One normalized carrier tracking event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub timestamp: DateTime<Utc>,
    /// "Locality, CC"
    pub location: String,
    pub status_code: String,
    pub description: String,
}

/// Shipment entity (one-to-one with an order)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    #[serde(
        default,
        with = "serde_helpers::option_record_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<RecordId>,
    #[serde(with = "serde_helpers::record_id")]
    pub order: RecordId,
    pub tracking_number: String,
    pub carrier: String,
    pub status: ShipmentStatus,
    /// 最新在前（协调器整表覆盖）
    #[serde(default)]
    pub tracking_events: Vec<TrackingEvent>,
    pub estimated_delivery: Option<NaiveDate>,
    pub actual_delivery: Option<DateTime<Utc>>,
    pub last_tracking_update: Option<DateTime<Utc>>,
    /// 运营商连续返回 "not found" 的次数，超过阈值后告警
    #[serde(default)]
    pub not_found_count: u32,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(ShipmentStatus::Delivered.is_terminal());
        assert!(ShipmentStatus::Failed.is_terminal());
        assert!(ShipmentStatus::Returned.is_terminal());
        for status in ShipmentStatus::ACTIVE {
            assert!(!status.is_terminal());
        }
    }
}
