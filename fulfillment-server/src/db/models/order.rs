//! Blister Order Model
//!
//! 订单在生成时固化两份快照：收货地址和当期用药清单。
//! 之后用户档案或用药清单的变更不会影响已生成的订单。

use super::serde_helpers;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// Order status enum
///
/// 正常流转 pending → … → delivered，canceled 为终态旁支。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    PharmacyCheck,
    Packaging,
    Shipped,
    Delivered,
    Canceled,
}

/// Frozen medication copy inside an order (never mutated after creation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub medication_name: String,
    pub medication_dosage: String,
    #[serde(default)]
    pub medication_pzn: String,
    // 服药时段（生成时刻的快照）
    #[serde(default)]
    pub morning: bool,
    #[serde(default)]
    pub noon: bool,
    #[serde(default)]
    pub evening: bool,
    #[serde(default)]
    pub night: bool,
    pub quantity: u32,
}

/// Blister order entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(
        default,
        with = "serde_helpers::option_record_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<RecordId>,
    #[serde(with = "serde_helpers::record_id")]
    pub user: RecordId,
    /// 订阅可能在订单之后被删除，因此可空
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub subscription: Option<RecordId>,
    /// Human-readable unique number, e.g. "BL-3F2A91C0"
    pub order_number: String,
    pub status: OrderStatus,
    /// 订单覆盖的日期区间 [start, end)
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    // 收货地址快照（创建时从用户档案拷贝，之后不可变）
    pub shipping_name: String,
    pub shipping_street: String,
    pub shipping_postal_code: String,
    pub shipping_city: String,
    pub shipping_country: String,
    pub items: Vec<OrderItem>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Generate a human-readable order number: "BL-" + 8 uppercase hex chars
    pub fn generate_order_number() -> String {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        format!("BL-{}", hex[..8].to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_number_format() {
        let number = Order::generate_order_number();
        assert!(number.starts_with("BL-"));
        assert_eq!(number.len(), 11);
        assert!(
            number[3..]
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn test_order_numbers_are_unique() {
        let a = Order::generate_order_number();
        let b = Order::generate_order_number();
        assert_ne!(a, b);
    }
}
