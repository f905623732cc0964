//! Subscription Repository
//!
//! Read-only queries against the subscription ledger. The billing subsystem
//! advances periods; this service never mutates a subscription.

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::Subscription;
use chrono::NaiveDate;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

const TABLE: &str = "subscription";

#[derive(Clone)]
pub struct SubscriptionRepository {
    base: BaseRepository,
}

impl SubscriptionRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Active subscriptions whose current period ends exactly on `date`
    pub async fn find_active_ending_on(&self, date: NaiveDate) -> RepoResult<Vec<Subscription>> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT * FROM subscription \
                 WHERE status = 'active' AND current_period_end = $date",
            )
            .bind(("date", date.to_string()))
            .await?;
        let subscriptions: Vec<Subscription> = result.take(0)?;
        Ok(subscriptions)
    }

    /// Active, non-renewing subscriptions ending exactly on `date`
    /// (expiry reminder sweep)
    pub async fn find_expiring_on(&self, date: NaiveDate) -> RepoResult<Vec<Subscription>> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT * FROM subscription \
                 WHERE status = 'active' \
                 AND cancel_at_period_end = true \
                 AND current_period_end = $date",
            )
            .bind(("date", date.to_string()))
            .await?;
        let subscriptions: Vec<Subscription> = result.take(0)?;
        Ok(subscriptions)
    }

    /// Insert a subscription (test fixtures; production rows are owned by billing)
    pub async fn create(&self, subscription: Subscription) -> RepoResult<Subscription> {
        let created: Option<Subscription> =
            self.base.db().create(TABLE).content(subscription).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create subscription".to_string()))
    }
}
