//! User Profile Model
//!
//! 用户档案由账户子系统维护，本服务只读。
//! 订单生成时从这里拷贝收货地址快照。

use super::serde_helpers;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// User profile entity (read-only in this service)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(
        default,
        with = "serde_helpers::option_record_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<RecordId>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// 街道 + 门牌号
    pub street: String,
    pub postal_code: String,
    pub city: String,
    /// ISO 3166-1 alpha-2
    pub country: String,
}

impl UserProfile {
    /// "First Last", trimmed when either part is empty
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}
