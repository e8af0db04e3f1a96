use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::pagination::DEFAULT_PAGE_SIZE;
use crate::CmsError;

/// 内置的安全事件类型
pub mod event_types {
    pub const LOGIN_FAILED: &str = "login.failed";
    pub const LOGIN_THROTTLED: &str = "login.throttled";
    pub const ACCESS_DENIED: &str = "access.denied";
}

/// 安全事件严重级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// 威胁评分权重
    pub fn weight(&self) -> u64 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 3,
            Severity::High => 10,
            Severity::Critical => 25,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = CmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(CmsError::validation(
                "severity",
                format!("unknown severity '{}'", other),
            )),
        }
    }
}

/// 待写入的安全事件
#[derive(Debug, Clone, PartialEq)]
pub struct NewSecurityEvent {
    pub event_type: String,
    pub severity: Severity,
    pub description: String,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl NewSecurityEvent {
    pub fn new(event_type: impl Into<String>, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            severity,
            description: description.into(),
            user_id: None,
            ip_address: None,
            details: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// 安全事件查询条件
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityEventFilter {
    pub severity: Option<Severity>,
    pub event_type: Option<String>,
    pub limit: u64,
    pub offset: u64,
}

impl Default for SecurityEventFilter {
    fn default() -> Self {
        Self {
            severity: None,
            event_type: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}
