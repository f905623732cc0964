//! 时间工具 — 业务时区与注入时钟
//!
//! 定时任务从 [`Clock`] 读取"今天"，而不是直接读墙钟，
//! 测试用固定时钟即可获得确定性的日期运算。

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

use super::{AppError, AppResult};

/// 时钟抽象 — 任务只通过它获取当前时间
pub trait Clock: Send + Sync {
    /// 当前 UTC 时间
    fn now(&self) -> DateTime<Utc>;

    /// 业务时区下的当前日期
    fn today(&self) -> NaiveDate;
}

/// 系统时钟（业务时区）
#[derive(Debug, Clone)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }
}

/// 固定时钟 — 测试用
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: DateTime<Utc>,
    tz: Tz,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>, tz: Tz) -> Self {
        Self { now, tz }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn today(&self) -> NaiveDate {
        self.now.with_timezone(&self.tz).date_naive()
    }
}

/// 解析每日触发时间 "HH:MM"
pub fn parse_trigger_time(value: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| AppError::validation(format!("Invalid trigger time: {}", value)))
}

/// 计算距离下一次每日触发点的 Duration
///
/// DST gap fallback: 如果目标本地时间不存在（夏令时跳跃），
/// 依次回退到 +1 分钟、当前时间 +1 小时。
pub fn duration_until_next_trigger(trigger: NaiveTime, tz: Tz) -> std::time::Duration {
    let now = Utc::now().with_timezone(&tz);
    let today = now.date_naive();

    let target_date = if now.time() >= trigger {
        // 今天的触发点已过，等明天
        today + chrono::Duration::days(1)
    } else {
        today
    };

    let target_datetime = target_date
        .and_time(trigger)
        .and_local_timezone(tz)
        .single()
        .unwrap_or_else(|| {
            (target_date.and_time(trigger) + chrono::Duration::minutes(1))
                .and_local_timezone(tz)
                .latest()
                .unwrap_or_else(|| {
                    tracing::error!("Cannot resolve local trigger time, using fallback");
                    now + chrono::Duration::hours(1)
                })
        });

    let duration = target_datetime.signed_duration_since(now);
    if duration.num_seconds() <= 0 {
        // Safety: 不应该发生，兜底 1 分钟
        std::time::Duration::from_secs(60)
    } else {
        duration
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_trigger_time() {
        let t = parse_trigger_time("05:30").unwrap();
        assert_eq!(t, NaiveTime::from_hms_opt(5, 30, 0).unwrap());
        assert!(parse_trigger_time("5h30").is_err());
    }

    #[test]
    fn test_duration_until_next_trigger_positive() {
        let trigger = NaiveTime::from_hms_opt(23, 59, 0).unwrap();
        let duration = duration_until_next_trigger(trigger, chrono_tz::Europe::Berlin);
        // 应该是正值（除非恰好在 23:59 运行）
        assert!(duration.as_secs() > 0);
        // 且不超过 24 小时
        assert!(duration.as_secs() <= 24 * 3600);
    }

    #[test]
    fn test_fixed_clock_today_uses_business_timezone() {
        // 2024-06-09 23:30 UTC 在柏林已经是 6 月 10 日
        let now = Utc.with_ymd_and_hms(2024, 6, 9, 23, 30, 0).unwrap();
        let clock = FixedClock::new(now, chrono_tz::Europe::Berlin);
        assert_eq!(
            clock.today(),
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
        );
    }
}
