use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::SessionData;

/// 会话存储 trait
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 保存会话
    async fn save(&self, session_id: &str, data: SessionData) -> Result<()>;

    /// 加载会话
    async fn load(&self, session_id: &str) -> Result<Option<SessionData>>;

    /// 删除会话
    async fn delete(&self, session_id: &str) -> Result<()>;

    /// 删除某个用户的全部会话，返回删除数量
    async fn delete_user_sessions(&self, user_id: &str) -> Result<u64>;

    /// 清理过期会话
    async fn cleanup_expired(&self, ttl_seconds: i64) -> Result<u64>;
}

/// 内存会话存储
///
/// 单实例部署使用；多实例需要共享存储。
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionData>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, session_id: &str, data: SessionData) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.to_string(), data);
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<SessionData>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: &str) -> Result<u64> {
        let mut sessions = self.sessions.write().await;
        let before_count = sessions.len();
        sessions.retain(|_, session| session.user_id != user_id);
        Ok((before_count - sessions.len()) as u64)
    }

    async fn cleanup_expired(&self, ttl_seconds: i64) -> Result<u64> {
        let mut sessions = self.sessions.write().await;
        let before_count = sessions.len();

        sessions.retain(|_, session| !session.is_expired(ttl_seconds));

        Ok((before_count - sessions.len()) as u64)
    }
}

#[cfg(feature = "redis-session")]
const REDIS_KEY_PREFIX: &str = "cms:session:";

/// Redis 会话存储
///
/// 过期交给 Redis 的 TTL 处理，每次保存都会重置 TTL。
#[cfg(feature = "redis-session")]
pub struct RedisSessionStore {
    client: redis::Client,
    ttl: std::time::Duration,
}

#[cfg(feature = "redis-session")]
impl RedisSessionStore {
    pub fn new(redis_url: &str, ttl: std::time::Duration) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client, ttl })
    }

    fn key(session_id: &str) -> String {
        format!("{}{}", REDIS_KEY_PREFIX, session_id)
    }
}

#[cfg(feature = "redis-session")]
#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn save(&self, session_id: &str, data: SessionData) -> Result<()> {
        use redis::AsyncCommands;

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let json = serde_json::to_string(&data)?;
        conn.set_ex::<_, _, ()>(Self::key(session_id), json, self.ttl.as_secs())
            .await?;
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<SessionData>> {
        use redis::AsyncCommands;

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let result: Option<String> = conn.get(Self::key(session_id)).await?;

        match result {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        use redis::AsyncCommands;

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(Self::key(session_id)).await?;
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: &str) -> Result<u64> {
        use redis::AsyncCommands;

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let keys: Vec<String> = conn.keys(format!("{}*", REDIS_KEY_PREFIX)).await?;

        let mut removed = 0;
        for key in keys {
            let json: Option<String> = conn.get(&key).await?;
            let Some(json) = json else { continue };
            let session: SessionData = serde_json::from_str(&json)?;
            if session.user_id == user_id {
                conn.del::<_, ()>(&key).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn cleanup_expired(&self, _ttl_seconds: i64) -> Result<u64> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    fn session(user_id: &str) -> SessionData {
        SessionData::new(user_id.to_string(), format!("{}@example.com", user_id), Role::Viewer)
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemorySessionStore::new();
        let session = session("user123");
        let session_id = session.session_id.clone();

        store.save(&session_id, session.clone()).await.unwrap();

        let loaded = store.load(&session_id).await.unwrap();
        assert_eq!(loaded.map(|s| s.user_id), Some("user123".to_string()));

        store.delete(&session_id).await.unwrap();
        assert!(store.load(&session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_user_sessions() {
        let store = MemorySessionStore::new();
        for s in [session("alice"), session("alice"), session("bob")] {
            store.save(&s.session_id.clone(), s).await.unwrap();
        }

        assert_eq!(store.delete_user_sessions("alice").await.unwrap(), 2);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let store = MemorySessionStore::new();

        let mut stale = session("user123");
        stale.last_active = chrono::Utc::now() - chrono::Duration::hours(2);
        store.save(&stale.session_id.clone(), stale).await.unwrap();

        let fresh = session("user456");
        store.save(&fresh.session_id.clone(), fresh).await.unwrap();

        let removed = store.cleanup_expired(3600).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count().await, 1);
    }
}
