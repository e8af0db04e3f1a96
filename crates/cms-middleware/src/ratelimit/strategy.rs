use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 限流策略
///
/// 每个策略在 `window` 内最多允许 `max_attempts` 次，之后按窗口速率逐步恢复。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RateLimitStrategy {
    /// 按客户端 IP
    ByIp { max_attempts: u64, window: Duration },

    /// 按登录账号
    ByAccount { max_attempts: u64, window: Duration },

    /// 全局
    Global { max_attempts: u64, window: Duration },
}

impl RateLimitStrategy {
    pub fn by_ip(max_attempts: u64, window_secs: u64) -> Self {
        Self::ByIp {
            max_attempts,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn by_account(max_attempts: u64, window_secs: u64) -> Self {
        Self::ByAccount {
            max_attempts,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn global(max_attempts: u64, window_secs: u64) -> Self {
        Self::Global {
            max_attempts,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ByIp { .. } => "ip",
            Self::ByAccount { .. } => "account",
            Self::Global { .. } => "global",
        }
    }

    /// 桶容量
    pub fn capacity(&self) -> u64 {
        match self {
            Self::ByIp { max_attempts, .. }
            | Self::ByAccount { max_attempts, .. }
            | Self::Global { max_attempts, .. } => *max_attempts,
        }
    }

    /// 每秒恢复的次数
    pub fn refill_rate(&self) -> f64 {
        match self {
            Self::ByIp { max_attempts, window }
            | Self::ByAccount { max_attempts, window }
            | Self::Global { max_attempts, window } => {
                let secs = window.as_secs_f64();
                if secs > 0.0 {
                    *max_attempts as f64 / secs
                } else {
                    0.0
                }
            }
        }
    }
}
