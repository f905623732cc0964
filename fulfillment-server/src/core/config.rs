use std::path::PathBuf;

use chrono::NaiveTime;
use chrono_tz::Tz;

use crate::utils::time::parse_trigger_time;

/// 服务配置 - 履约节点的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/blisterpost/fulfillment | 工作目录 |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | TIMEZONE | Europe/Berlin | 业务时区 |
/// | DAILY_TRIGGER | 05:30 | 每日任务触发时间 (HH:MM, 业务时区) |
/// | TRACKING_INTERVAL_HOURS | 2 | 对账轮询间隔（小时） |
/// | DHL_API_URL | https://api-eu.dhl.com/track/shipments | DHL 跟踪 API |
/// | DHL_API_KEY | (空) | DHL API Key |
/// | DHL_TIMEOUT_SECS | 10 | 单次跟踪调用超时（秒） |
/// | NOTIFY_ENDPOINT | http://localhost:3001/intents | 通知分发器地址 |
/// | NOTIFY_QUEUE_CAPACITY | 256 | 出站意图队列容量 |
/// | NOTIFY_RETRY_BASE_SECS | 60 | 投递重试基础间隔（秒） |
/// | NOTIFY_MAX_ATTEMPTS | 3 | 投递最大尝试次数 |
/// | TRACKING_NOT_FOUND_FLAG_THRESHOLD | 12 | 连续 not-found 告警阈值 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/blisterpost DHL_API_KEY=... cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库、日志等文件
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    /// 业务时区（"明天"、每日触发点都按它计算）
    pub timezone: Tz,
    /// 每日任务触发时间（业务时区）
    pub daily_trigger: NaiveTime,
    /// 对账轮询间隔（小时）
    pub tracking_interval_hours: u64,

    // === 运营商 API ===
    pub dhl_api_url: String,
    pub dhl_api_key: String,
    pub dhl_timeout_secs: u64,

    // === 通知分发器 ===
    pub notify_endpoint: String,
    pub notify_queue_capacity: usize,
    pub notify_retry_base_secs: u64,
    pub notify_max_attempts: u32,

    /// 连续 not-found 超过该值后告警
    pub not_found_flag_threshold: u32,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR")
                .unwrap_or_else(|_| "/var/lib/blisterpost/fulfillment".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            timezone: std::env::var("TIMEZONE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(chrono_tz::Europe::Berlin),
            daily_trigger: std::env::var("DAILY_TRIGGER")
                .ok()
                .and_then(|v| parse_trigger_time(&v).ok())
                .unwrap_or_else(|| NaiveTime::from_hms_opt(5, 30, 0).unwrap()),
            tracking_interval_hours: std::env::var("TRACKING_INTERVAL_HOURS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(2),

            dhl_api_url: std::env::var("DHL_API_URL")
                .unwrap_or_else(|_| "https://api-eu.dhl.com/track/shipments".into()),
            dhl_api_key: std::env::var("DHL_API_KEY").unwrap_or_default(),
            dhl_timeout_secs: std::env::var("DHL_TIMEOUT_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10),

            notify_endpoint: std::env::var("NOTIFY_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:3001/intents".into()),
            notify_queue_capacity: std::env::var("NOTIFY_QUEUE_CAPACITY")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(256),
            notify_retry_base_secs: std::env::var("NOTIFY_RETRY_BASE_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(60),
            notify_max_attempts: std::env::var("NOTIFY_MAX_ATTEMPTS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3),

            not_found_flag_threshold: std::env::var("TRACKING_NOT_FOUND_FLAG_THRESHOLD")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(12),
        }
    }

    /// 数据库目录 {work_dir}/database
    pub fn database_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database")
    }

    /// 日志目录 {work_dir}/logs
    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    /// 确保工作目录结构存在
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.database_dir())?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
