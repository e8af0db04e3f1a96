use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{SessionData, SessionStore};
use crate::auth::Role;

/// 会话管理器
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl SessionManager {
    /// 创建新的会话管理器
    ///
    /// 过期会话在读取时惰性删除；周期清理需要调用 [`SessionManager::start_cleanup_task`]。
    pub fn new(store: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn ttl_secs(&self) -> i64 {
        self.ttl.as_secs() as i64
    }

    /// 创建新会话
    pub async fn create_session(
        &self,
        user_id: String,
        email: String,
        role: Role,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<SessionData> {
        let session = SessionData::new(user_id, email, role).with_client(ip_address, user_agent);
        self.store.save(&session.session_id, session.clone()).await?;

        cms_metrics::global().record_session_created();
        info!(session_id = %session.session_id, user_id = %session.user_id, role = %session.role, "Session created");
        Ok(session)
    }

    /// 获取会话，过期的会话会被删除
    pub async fn get_session(&self, session_id: &str) -> Result<Option<SessionData>> {
        let session = self.store.load(session_id).await?;

        if let Some(ref s) = session {
            if s.is_expired(self.ttl_secs()) {
                self.store.delete(session_id).await?;
                debug!(session_id = session_id, "Session expired and removed");
                return Ok(None);
            }
        }

        Ok(session)
    }

    /// 刷新会话（更新最后活跃时间）
    pub async fn touch_session(&self, mut session: SessionData) -> Result<SessionData> {
        session.touch();
        self.store.save(&session.session_id, session.clone()).await?;
        debug!(session_id = %session.session_id, "Session refreshed");
        Ok(session)
    }

    /// 删除会话
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.store.delete(session_id).await?;
        info!(session_id = session_id, "Session deleted");
        Ok(())
    }

    /// 删除用户的全部会话
    pub async fn revoke_user(&self, user_id: &str) -> Result<u64> {
        let removed = self.store.delete_user_sessions(user_id).await?;
        if removed > 0 {
            info!(user_id = user_id, removed = removed, "User sessions revoked");
        }
        Ok(removed)
    }

    /// 清理一次过期会话
    pub async fn cleanup_expired(&self) -> Result<u64> {
        self.store.cleanup_expired(self.ttl_secs()).await
    }

    /// 启动定期清理任务
    pub fn start_cleanup_task(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;

                match self.cleanup_expired().await {
                    Ok(removed) => {
                        if removed > 0 {
                            info!(removed = removed, "Cleaned up expired sessions");
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to cleanup expired sessions");
                    }
                }
            }
        })
    }
}
