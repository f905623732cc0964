//! Blister Order Repository
//!
//! Orders are created by the generator and advanced by fulfillment / the
//! shipment reconciler. The (user, period_start) unique index backs the
//! duplicate-generation guard at the storage layer.

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::{Order, OrderStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

const TABLE: &str = "blister_order";

/// Unique index backing the one-order-per-period invariant
const USER_PERIOD_INDEX: &str = "order_user_period";

#[derive(Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Find an order by record id
    pub async fn find_by_id(&self, id: &RecordId) -> RepoResult<Option<Order>> {
        let order: Option<Order> = self.base.db().select(id.clone()).await?;
        Ok(order)
    }

    /// Does an order already exist for this user and period start?
    pub async fn exists_for_period(&self, user: &RecordId, period_start: NaiveDate) -> RepoResult<bool> {
        #[derive(Debug, Deserialize)]
        struct NumberRow {
            #[allow(dead_code)]
            order_number: String,
        }

        let mut result = self
            .base
            .db()
            .query(
                "SELECT order_number FROM blister_order \
                 WHERE user = $user AND period_start = $period_start \
                 LIMIT 1",
            )
            // RecordId 字段落库为 "table:id" 字符串，按字符串比较
            .bind(("user", user.to_string()))
            .bind(("period_start", period_start.to_string()))
            .await?;
        let rows: Vec<NumberRow> = result.take(0)?;
        Ok(!rows.is_empty())
    }

    /// Create a new order
    ///
    /// A violation of the (user, period_start) unique index surfaces as
    /// [`RepoError::Duplicate`] so the generator can treat a concurrent
    /// double-run as a silent skip.
    pub async fn create(&self, order: Order) -> RepoResult<Order> {
        let created: Result<Option<Order>, surrealdb::Error> =
            self.base.db().create(TABLE).content(order).await;
        match created {
            Ok(Some(order)) => Ok(order),
            Ok(None) => Err(RepoError::Database("Failed to create order".to_string())),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains(USER_PERIOD_INDEX) {
                    Err(RepoError::Duplicate(format!(
                        "Order already exists for this period: {}",
                        msg
                    )))
                } else {
                    Err(RepoError::Database(msg))
                }
            }
        }
    }

    /// Propagate a delivered shipment to the owning order
    pub async fn mark_delivered(&self, id: &RecordId, delivered_at: DateTime<Utc>) -> RepoResult<()> {
        #[derive(Debug, Serialize)]
        struct DeliveredPatch {
            status: OrderStatus,
            delivered_at: DateTime<Utc>,
        }

        let updated: Option<Order> = self
            .base
            .db()
            .update(id.clone())
            .merge(DeliveredPatch {
                status: OrderStatus::Delivered,
                delivered_at,
            })
            .await?;
        if updated.is_none() {
            return Err(RepoError::NotFound(format!("Order {} not found", id)));
        }
        Ok(())
    }
}
