use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::auth::Role;

/// 会话数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    /// 会话 ID
    pub session_id: String,

    /// 用户 ID
    pub user_id: String,

    /// 登录邮箱
    pub email: String,

    /// 创建会话时的角色
    pub role: Role,

    /// 创建时间
    pub created_at: DateTime<Utc>,

    /// 最后活跃时间
    pub last_active: DateTime<Utc>,

    /// 客户端地址
    pub ip_address: Option<String>,

    pub user_agent: Option<String>,

    /// 元数据
    pub metadata: HashMap<String, String>,
}

impl SessionData {
    /// 创建新的会话数据
    pub fn new(user_id: String, email: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id,
            email,
            role,
            created_at: now,
            last_active: now,
            ip_address: None,
            user_agent: None,
            metadata: HashMap::new(),
        }
    }

    /// 更新最后活跃时间
    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    /// 设置客户端信息
    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }

    /// 添加元数据
    pub fn add_metadata(mut self, key: String, value: String) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// 检查会话是否过期（按最后活跃时间计算）
    pub fn is_expired(&self, ttl_seconds: i64) -> bool {
        let now = Utc::now();
        let duration = now.signed_duration_since(self.last_active);
        duration.num_seconds() > ttl_seconds
    }
}
