use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{AuthError, Role};
use crate::session::SessionData;

/// 会话令牌签发器
///
/// 令牌只携带会话引用，会话是否仍然有效以会话存储为准。
pub struct SessionTokens {
    secret: Arc<String>,
    expiration: Duration,
}

/// JWT Claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,   // 用户 ID
    pub email: String, // 用户邮箱
    pub role: Role,    // 签发时的角色
    pub sid: String,   // 会话 ID
    pub exp: i64,      // 过期时间
    pub iat: i64,      // 签发时间
}

impl SessionTokens {
    pub fn new(secret: String, expiration_secs: i64) -> Self {
        Self {
            secret: Arc::new(secret),
            expiration: Duration::seconds(expiration_secs),
        }
    }

    /// 为会话签发令牌，返回令牌和过期时间
    pub fn issue(&self, session: &SessionData) -> Result<(String, DateTime<Utc>), AuthError> {
        let now = Utc::now();
        let expires_at = now + self.expiration;

        let claims = Claims {
            sub: session.user_id.clone(),
            email: session.email.clone(),
            role: session.role,
            sid: session.session_id.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;

        Ok((token, expires_at))
    }

    /// 校验签名和过期时间
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }
}
