//! Scheduled order generation
//!
//! 每日任务：为"周期明天结束"的活跃订阅各生成下一期订单。
//! 幂等保证两层：应用层存在性检查 + (user, period_start) 唯一索引，
//! 重复运行或并发运行都不会产生第二张订单。

use chrono::NaiveDate;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::db::models::{Order, OrderItem, OrderStatus, Subscription};
use crate::db::repository::{
    MedicationRepository, OrderRepository, RepoError, SubscriptionRepository, UserRepository,
};
use crate::notify::{NotificationIntent, NotificationKind, NotificationQueue};
use crate::utils::{AppError, AppResult, Clock};

/// Generates one order per due subscription per period
pub struct OrderGenerator {
    db: Surreal<Db>,
    notifications: NotificationQueue,
}

impl OrderGenerator {
    pub fn new(db: Surreal<Db>, notifications: NotificationQueue) -> Self {
        Self { db, notifications }
    }

    /// 执行一轮生成，返回本轮创建的订单数
    ///
    /// "没有到期订阅" 是正常结果（返回 0），单个订阅的失败只记录
    /// 日志，不中断整批。
    pub async fn run(&self, clock: &dyn Clock) -> usize {
        let tomorrow = clock.today() + chrono::Duration::days(1);

        let subscriptions = match SubscriptionRepository::new(self.db.clone())
            .find_active_ending_on(tomorrow)
            .await
        {
            Ok(subs) => subs,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load due subscriptions");
                return 0;
            }
        };

        let mut created = 0;
        for subscription in &subscriptions {
            match self
                .generate_for_subscription(subscription, tomorrow, clock)
                .await
            {
                Ok(true) => created += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        subscription = ?subscription.id,
                        error = %e,
                        "Failed to generate order for subscription"
                    );
                }
            }
        }

        tracing::info!(
            count = created,
            due = subscriptions.len(),
            period_start = %tomorrow,
            "Scheduled order generation finished"
        );
        created
    }

    /// 为单个订阅生成下一期订单；已存在则静默跳过（返回 false）
    async fn generate_for_subscription(
        &self,
        subscription: &Subscription,
        tomorrow: NaiveDate,
        clock: &dyn Clock,
    ) -> AppResult<bool> {
        let orders = OrderRepository::new(self.db.clone());

        if orders.exists_for_period(&subscription.user, tomorrow).await? {
            tracing::debug!(
                subscription = ?subscription.id,
                period_start = %tomorrow,
                "Order already exists for period, skipping"
            );
            return Ok(false);
        }

        let user = UserRepository::new(self.db.clone())
            .find_by_id(&subscription.user)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("User {} not found", subscription.user))
            })?;

        // 当期激活用药的冻结拷贝；空清单也照常生成订单
        let medications = MedicationRepository::new(self.db.clone())
            .find_active_for_user(&subscription.user)
            .await?;
        let items: Vec<OrderItem> = medications
            .iter()
            .map(|med| OrderItem {
                medication_name: med.name.clone(),
                medication_dosage: med.dosage.clone(),
                medication_pzn: med.pzn.clone(),
                morning: med.morning,
                noon: med.noon,
                evening: med.evening,
                night: med.night,
                quantity: 1,
            })
            .collect();

        let period_end = tomorrow + chrono::Duration::days(subscription.plan.interval_days);
        let order = Order {
            id: None,
            user: subscription.user.clone(),
            subscription: subscription.id.clone(),
            order_number: Order::generate_order_number(),
            status: OrderStatus::Pending,
            period_start: tomorrow,
            period_end,
            shipping_name: user.full_name(),
            shipping_street: user.street.clone(),
            shipping_postal_code: user.postal_code.clone(),
            shipping_city: user.city.clone(),
            shipping_country: user.country.clone(),
            items,
            delivered_at: None,
            created_at: clock.now(),
        };

        let order = match orders.create(order).await {
            Ok(order) => order,
            Err(RepoError::Duplicate(_)) => {
                // 并发运行时另一个实例先落库 — 唯一索引兜底，按跳过处理
                tracing::debug!(
                    subscription = ?subscription.id,
                    period_start = %tomorrow,
                    "Concurrent generation already created this order, skipping"
                );
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        // Fire-and-forget：入队失败不回滚订单
        self.notifications.enqueue(NotificationIntent {
            kind: NotificationKind::OrderConfirmation,
            recipient: user.email.clone(),
            context: serde_json::json!({
                "order_number": order.order_number,
                "period_start": order.period_start,
                "period_end": order.period_end,
            }),
        });

        tracing::info!(
            order_number = %order.order_number,
            user = %order.user,
            items = order.items.len(),
            period_start = %order.period_start,
            period_end = %order.period_end,
            "Created scheduled order"
        );
        Ok(true)
    }
}
