//! Subscription expiry reminders
//!
//! 每日任务：对"3 天后到期且不再续订"的活跃订阅各发一条提醒意图。

use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::db::models::Subscription;
use crate::db::repository::{SubscriptionRepository, UserRepository};
use crate::notify::{NotificationIntent, NotificationKind, NotificationQueue};
use crate::utils::{AppError, AppResult, Clock};

/// 到期提醒的提前天数
const REMINDER_LEAD_DAYS: i64 = 3;

pub struct SubscriptionReminders {
    db: Surreal<Db>,
    notifications: NotificationQueue,
}

impl SubscriptionReminders {
    pub fn new(db: Surreal<Db>, notifications: NotificationQueue) -> Self {
        Self { db, notifications }
    }

    /// 执行一轮提醒，返回入队的提醒数
    pub async fn run(&self, clock: &dyn Clock) -> usize {
        let target = clock.today() + chrono::Duration::days(REMINDER_LEAD_DAYS);

        let subscriptions = match SubscriptionRepository::new(self.db.clone())
            .find_expiring_on(target)
            .await
        {
            Ok(subs) => subs,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load expiring subscriptions");
                return 0;
            }
        };

        let mut sent = 0;
        for subscription in &subscriptions {
            match self.remind(subscription).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::error!(
                        subscription = ?subscription.id,
                        error = %e,
                        "Failed to queue subscription ending reminder"
                    );
                }
            }
        }

        tracing::info!(count = sent, ending = %target, "Subscription ending reminders queued");
        sent
    }

    async fn remind(&self, subscription: &Subscription) -> AppResult<()> {
        let user = UserRepository::new(self.db.clone())
            .find_by_id(&subscription.user)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("User {} not found", subscription.user))
            })?;

        self.notifications.enqueue(NotificationIntent {
            kind: NotificationKind::SubscriptionEnding,
            recipient: user.email.clone(),
            context: serde_json::json!({
                "plan": subscription.plan.name,
                "current_period_end": subscription.current_period_end,
            }),
        });
        Ok(())
    }
}
