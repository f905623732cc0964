//! Medication Model
//!
//! 用户当前用药清单，由护理端维护，本服务只读。
//! 订单生成时只拷贝 is_active = true 的条目。

use super::serde_helpers;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// Medication entity (read-only in this service)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    #[serde(
        default,
        with = "serde_helpers::option_record_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<RecordId>,
    #[serde(with = "serde_helpers::record_id")]
    pub user: RecordId,
    pub name: String,
    pub dosage: String,
    /// Pharmazentralnummer
    #[serde(default)]
    pub pzn: String,
    // 服药时段
    #[serde(default)]
    pub morning: bool,
    #[serde(default)]
    pub noon: bool,
    #[serde(default)]
    pub evening: bool,
    #[serde(default)]
    pub night: bool,
    #[serde(default)]
    pub instructions: String,
    pub is_active: bool,
}
