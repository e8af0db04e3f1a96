use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use std::sync::Arc;
use tracing::debug;

use super::{SessionData, SessionManager};
use crate::auth::SessionTokens;

/// 从请求头解析当前会话
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// 没有有效会话时返回 `Ok(None)`；只有存储故障才返回错误
    async fn resolve(&self, headers: &HeaderMap) -> anyhow::Result<Option<SessionData>>;
}

/// 取出令牌：优先 `Authorization: Bearer`，其次会话 Cookie
pub fn extract_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    bearer.or_else(|| {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|h| h.to_str().ok())
            .flat_map(|h| h.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == cookie_name)
            .map(|(_, value)| value.trim())
            .filter(|v| !v.is_empty())
    })
}

/// 令牌 + 会话存储的解析器
///
/// 令牌签名有效、会话仍在存储中且属于同一用户时才算有效会话，
/// 登出或过期后令牌即失效。
pub struct TokenSessionResolver {
    tokens: Arc<SessionTokens>,
    sessions: Arc<SessionManager>,
    cookie_name: String,
}

impl TokenSessionResolver {
    pub fn new(tokens: Arc<SessionTokens>, sessions: Arc<SessionManager>, cookie_name: impl Into<String>) -> Self {
        Self {
            tokens,
            sessions,
            cookie_name: cookie_name.into(),
        }
    }

    fn reject(reason: &'static str) -> anyhow::Result<Option<SessionData>> {
        cms_metrics::global().record_auth_failure(reason);
        debug!(reason = reason, "Session rejected");
        Ok(None)
    }
}

#[async_trait]
impl SessionResolver for TokenSessionResolver {
    async fn resolve(&self, headers: &HeaderMap) -> anyhow::Result<Option<SessionData>> {
        let Some(token) = extract_token(headers, &self.cookie_name) else {
            return Self::reject("missing_token");
        };

        let claims = match self.tokens.verify(token) {
            Ok(claims) => claims,
            Err(_) => return Self::reject("invalid_token"),
        };

        let Some(session) = self.sessions.get_session(&claims.sid).await? else {
            return Self::reject("session_expired");
        };

        if session.user_id != claims.sub {
            return Self::reject("session_mismatch");
        }

        let session = self.sessions.touch_session(session).await?;
        Ok(Some(session))
    }
}
