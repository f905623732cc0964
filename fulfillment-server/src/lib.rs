//! BlisterPost Fulfillment Server - 订阅履约后台节点
//!
//! # 架构概述
//!
//! 本服务承担订阅制药盒 (Blister) 业务的履约流水线：
//!
//! - **订单生成** (`jobs::order_generator`): 每日为到期订阅生成下一期订单
//! - **运单对账** (`jobs::tracking_reconciler`): 周期性轮询运营商跟踪 API
//! - **运营商适配** (`carrier`): DHL 跟踪接口与状态词表映射
//! - **通知出站** (`notify`): fire-and-forget 意图队列 + 投递工作者
//! - **数据库** (`db`): 嵌入式 SurrealDB 存储
//!
//! # 模块结构
//!
//! ```text
//! fulfillment-server/src/
//! ├── core/          # 配置、状态、后台任务管理
//! ├── db/            # 数据库层 (models + repository)
//! ├── carrier/       # 运营商跟踪适配器
//! ├── jobs/          # 定时任务流水线
//! ├── notify/        # 出站通知
//! ├── api/           # HTTP 运维接口
//! └── utils/         # 错误、日志、时间工具
//! ```

pub mod api;
pub mod carrier;
pub mod core;
pub mod db;
pub mod jobs;
pub mod notify;
pub mod utils;

// Re-export 公共类型
pub use carrier::{CarrierTracker, DhlClient, TrackOutcome, TrackingResult};
pub use core::{AppState, BackgroundTasks, Config, TaskKind};
pub use jobs::{JobScheduler, OrderGenerator, ShipmentReconciler, SubscriptionReminders};
pub use notify::{NotificationIntent, NotificationKind, NotificationQueue};
pub use utils::{AppError, AppResult, Clock, FixedClock, SystemClock};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 设置运行环境 (dotenv + 日志)
pub fn setup_environment() {
    dotenv::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    init_logger_with_file(log_level.as_deref(), log_dir.as_deref());
}

pub fn print_banner() {
    println!(
        r#"
    ____  ___      __            ____             __
   / __ )/ (_)____/ /____  _____/ __ \____  _____/ /_
  / __  / / / ___/ __/ _ \/ ___/ /_/ / __ \/ ___/ __/
 / /_/ / / (__  ) /_/  __/ /  / ____/ /_/ (__  ) /_
/_____/_/_/____/\__/\___/_/  /_/    \____/____/\__/
    "#
    );
}
