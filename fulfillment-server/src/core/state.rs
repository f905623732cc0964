use std::sync::Arc;
use std::time::Duration;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::carrier::{CarrierTracker, DhlClient};
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::Config;
use crate::db;
use crate::jobs::JobScheduler;
use crate::notify::{HttpNotifyTransport, NotificationQueue, NotificationWorker};
use crate::utils::{AppError, AppResult, Clock, SystemClock};

/// 服务状态 - 持有所有服务的共享引用
///
/// 使用 Arc 实现浅拷贝，所有权成本极低。
///
/// # 服务组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | db | Surreal<Db> | 嵌入式数据库 |
/// | carrier | Arc<dyn CarrierTracker> | 运营商跟踪适配器 |
/// | notifications | NotificationQueue | 出站通知队列句柄 |
/// | clock | Arc<dyn Clock> | 注入时钟 |
#[derive(Clone)]
pub struct AppState {
    /// 服务配置
    pub config: Config,
    /// 嵌入式数据库 (SurrealDB)
    pub db: Surreal<Db>,
    /// 运营商跟踪适配器
    pub carrier: Arc<dyn CarrierTracker>,
    /// 出站通知队列
    pub notifications: NotificationQueue,
    /// 注入时钟（任务通过它取"今天"）
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// 初始化服务状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录结构
    /// 2. 数据库 (work_dir/database)
    /// 3. 运营商客户端、通知队列
    ///
    /// 返回状态和通知投递工作者（由调用方注册为后台任务）。
    pub async fn initialize(config: &Config) -> AppResult<(Self, NotificationWorker)> {
        // 0. Ensure work_dir structure exists
        config
            .ensure_work_dir_structure()
            .map_err(|e| AppError::internal(format!("Failed to create work directory: {e}")))?;

        // 1. Initialize DB
        let db = db::connect(&config.database_dir()).await?;

        // 2. Carrier client
        let carrier: Arc<dyn CarrierTracker> = Arc::new(DhlClient::new(
            config.dhl_api_url.clone(),
            config.dhl_api_key.clone(),
            Duration::from_secs(config.dhl_timeout_secs),
        )?);

        // 3. Notification outbox
        let (notifications, rx) = NotificationQueue::channel(config.notify_queue_capacity);
        let transport = Arc::new(HttpNotifyTransport::new(
            config.notify_endpoint.clone(),
            Duration::from_secs(30),
        )?);
        let worker = NotificationWorker::new(
            rx,
            transport,
            Duration::from_secs(config.notify_retry_base_secs),
            config.notify_max_attempts,
        );

        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(config.timezone));

        let state = Self {
            config: config.clone(),
            db,
            carrier,
            notifications,
            clock,
        };

        Ok((state, worker))
    }

    /// 启动后台任务
    ///
    /// 必须在 HTTP 服务启动之前调用。
    ///
    /// 启动的任务：
    /// - 通知投递工作者
    /// - 每日任务循环（订单生成 + 到期提醒）
    /// - 对账轮询循环
    pub fn start_background_tasks(&self, tasks: &mut BackgroundTasks, worker: NotificationWorker) {
        let shutdown = tasks.shutdown_token();

        tasks.spawn("notification_worker", TaskKind::Worker, {
            let shutdown = shutdown.clone();
            async move { worker.run(shutdown).await }
        });

        tasks.spawn("daily_jobs", TaskKind::Periodic, {
            let scheduler = JobScheduler::new(self.clone(), shutdown.clone());
            async move { scheduler.run_daily().await }
        });

        tasks.spawn("tracking_reconciliation", TaskKind::Periodic, {
            let scheduler = JobScheduler::new(self.clone(), shutdown);
            async move { scheduler.run_tracking().await }
        });

        tasks.log_summary();
    }

    /// 获取数据库实例
    pub fn get_db(&self) -> Surreal<Db> {
        self.db.clone()
    }
}
