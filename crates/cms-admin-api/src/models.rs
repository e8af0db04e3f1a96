use chrono::{DateTime, TimeZone, Utc};
use cms_core::entity::{audit_logs, security_events, users};
use cms_core::pagination::DEFAULT_PAGE_SIZE;
use cms_core::{AuditLogFilter, AuditOutcome, Page, SecurityEventFilter, Severity};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

use crate::error::Result;

/// 成功响应的统一外壳
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// 列表响应
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

impl<T> From<Page<T>> for ListResponse<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            data: page.items,
            total: page.total,
            limit: page.limit,
            offset: page.offset,
        }
    }
}

const DEFAULT_DAYS: u32 = 30;
const MAX_DAYS: u32 = 365;

fn default_limit() -> u64 {
    DEFAULT_PAGE_SIZE
}

fn parse_days(raw: &str) -> Option<u32> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|days| (1..=MAX_DAYS).contains(days))
}

fn validate_days(raw: &str) -> std::result::Result<(), ValidationError> {
    match parse_days(raw) {
        Some(_) => Ok(()),
        None => {
            let mut error = ValidationError::new("range");
            error.message = Some(Cow::from("must be an integer between 1 and 365"));
            Err(error)
        }
    }
}

/// 统计窗口
///
/// `days` 按原始字符串接收，非数字和负数也归到 `days` 字段的校验错误里。
#[derive(Debug, Default, Deserialize, Validate)]
pub struct StatsQuery {
    #[serde(default)]
    #[validate(custom = "validate_days")]
    pub days: Option<String>,
}

impl StatsQuery {
    /// 校验通过后的天数，缺省 30
    pub fn days(&self) -> u32 {
        self.days
            .as_deref()
            .and_then(parse_days)
            .unwrap_or(DEFAULT_DAYS)
    }
}

/// 分页参数
#[derive(Debug, Deserialize, Validate)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 200, message = "must be between 1 and 200"))]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

/// 审计日志查询
#[derive(Debug, Deserialize, Validate)]
pub struct AuditLogQuery {
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 200, message = "must be between 1 and 200"))]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
    pub user_id: Option<String>,
    pub action: Option<String>,
    pub outcome: Option<String>,
}

impl AuditLogQuery {
    pub fn into_filter(self) -> Result<AuditLogFilter> {
        let outcome = self
            .outcome
            .as_deref()
            .map(str::parse::<AuditOutcome>)
            .transpose()?;

        Ok(AuditLogFilter {
            user_id: self.user_id,
            action: self.action,
            outcome,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

/// 安全事件查询
#[derive(Debug, Deserialize, Validate)]
pub struct SecurityEventQuery {
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 200, message = "must be between 1 and 200"))]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
    pub severity: Option<String>,
    pub event_type: Option<String>,
}

impl SecurityEventQuery {
    pub fn into_filter(self) -> Result<SecurityEventFilter> {
        let severity = self
            .severity
            .as_deref()
            .map(str::parse::<Severity>)
            .transpose()?;

        Ok(SecurityEventFilter {
            severity,
            event_type: self.event_type,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

/// 手工上报安全事件
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSecurityEventRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub event_type: String,
    pub severity: Severity,
    #[validate(length(min = 1, max = 2000, message = "must be 1-2000 characters"))]
    pub description: String,
    pub user_id: Option<String>,
    #[validate(length(max = 64, message = "must be at most 64 characters"))]
    pub ip_address: Option<String>,
    pub details: Option<serde_json::Value>,
}

/// 登录请求
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: String,
}

impl From<users::Model> for UserResponse {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub id: String,
    pub user_id: Option<String>,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<String>,
    pub outcome: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<audit_logs::Model> for AuditLogResponse {
    fn from(log: audit_logs::Model) -> Self {
        Self {
            id: log.id,
            user_id: log.user_id,
            action: log.action,
            resource: log.resource,
            resource_id: log.resource_id,
            outcome: log.outcome,
            ip_address: log.ip_address,
            user_agent: log.user_agent,
            details: log.details,
            created_at: from_millis(log.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SecurityEventResponse {
    pub id: String,
    pub event_type: String,
    pub severity: String,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub description: String,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<security_events::Model> for SecurityEventResponse {
    fn from(event: security_events::Model) -> Self {
        Self {
            id: event.id,
            event_type: event.event_type,
            severity: event.severity,
            user_id: event.user_id,
            ip_address: event.ip_address,
            description: event.description,
            details: event.details,
            created_at: from_millis(event.created_at),
        }
    }
}
