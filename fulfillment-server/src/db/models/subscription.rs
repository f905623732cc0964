//! Subscription Model
//!
//! 订阅台账由结算子系统推进（结算不在本服务范围内），
//! 订单生成器只读：按 "周期明天结束" 查询。

use super::serde_helpers;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// Subscription status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Paused,
    Canceled,
}

/// Plan snapshot embedded in the subscription by the billing subsystem.
///
/// `interval_days` drives the period arithmetic for generated orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub name: String,
    pub slug: String,
    // TODO: the quarterly tier ("vierteljaehrlich") stores interval_days = 28,
    // so a quarterly subscription yields monthly-length order periods; confirm
    // the intended cadence with product before changing the arithmetic here.
    pub interval_days: i64,
}

/// Subscription entity (read-only in this service)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(
        default,
        with = "serde_helpers::option_record_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<RecordId>,
    #[serde(with = "serde_helpers::record_id")]
    pub user: RecordId,
    pub plan: PlanSnapshot,
    pub status: SubscriptionStatus,
    /// 当前结算周期 [start, end)
    pub current_period_start: NaiveDate,
    pub current_period_end: NaiveDate,
    /// 周期结束后不再续订（到期提醒的筛选条件）
    #[serde(default)]
    pub cancel_at_period_end: bool,
}
