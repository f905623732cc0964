//! 定时任务调度
//!
//! 两条独立的循环，都注册为 `TaskKind::Periodic`：
//! - 每日循环：业务时区到达 `daily_trigger` 时生成订单 + 到期提醒
//! - 间隔循环：每 `tracking_interval_hours` 小时对账一次，启动时先补跑一轮
//!
//! 两条循环都通过 `tokio::select!` 响应 shutdown 信号。

use tokio_util::sync::CancellationToken;

use crate::core::AppState;
use crate::jobs::{OrderGenerator, ShipmentReconciler, SubscriptionReminders};
use crate::utils::time;

/// Periodic job loops over the shared application state
pub struct JobScheduler {
    state: AppState,
    shutdown: CancellationToken,
}

impl JobScheduler {
    pub fn new(state: AppState, shutdown: CancellationToken) -> Self {
        Self { state, shutdown }
    }

    /// 每日循环：等到下一个触发点，然后依次跑订单生成和到期提醒
    pub async fn run_daily(self) {
        tracing::info!("Daily job scheduler started");

        loop {
            let sleep_duration = time::duration_until_next_trigger(
                self.state.config.daily_trigger,
                self.state.config.timezone,
            );
            tracing::info!(
                "Next daily trigger in {} minutes",
                sleep_duration.as_secs() / 60
            );

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {}
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Daily job scheduler received shutdown signal");
                    return;
                }
            }

            let generator = OrderGenerator::new(
                self.state.db.clone(),
                self.state.notifications.clone(),
            );
            generator.run(self.state.clock.as_ref()).await;

            let reminders = SubscriptionReminders::new(
                self.state.db.clone(),
                self.state.notifications.clone(),
            );
            reminders.run(self.state.clock.as_ref()).await;
        }
    }

    /// 间隔循环：启动补跑一轮（停机期间的状态自愈），之后固定间隔
    pub async fn run_tracking(self) {
        tracing::info!("Tracking reconciliation scheduler started");

        let interval =
            std::time::Duration::from_secs(self.state.config.tracking_interval_hours * 3600);

        // Startup catch-up
        self.reconcile_once().await;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Tracking scheduler received shutdown signal");
                    return;
                }
            }

            self.reconcile_once().await;
        }
    }

    async fn reconcile_once(&self) {
        let reconciler = ShipmentReconciler::new(
            self.state.db.clone(),
            self.state.carrier.clone(),
            self.state.notifications.clone(),
            self.state.config.not_found_flag_threshold,
        );
        reconciler.run(self.state.clock.as_ref()).await;
    }
}
