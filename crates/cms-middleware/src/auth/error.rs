use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use super::Permission;

/// 认证与授权错误
#[derive(Debug, Error)]
pub enum AuthError {
    /// 没有有效会话
    #[error("authentication required")]
    Unauthenticated,

    /// 会话存在但缺少权限
    #[error("missing permission {0}")]
    Forbidden(Permission),

    /// 令牌签发失败
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// 会话解析失败
    #[error("session error: {0}")]
    Session(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::Token(_) | AuthError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AuthError::Unauthenticated => json!({ "error": "Unauthorized" }),
            AuthError::Forbidden(missing) => json!({
                "error": "Forbidden",
                "details": { "required": missing.to_string() },
            }),
            AuthError::Token(_) | AuthError::Session(_) => {
                error!(error = %self, "Authorization pipeline failed");
                json!({ "error": "Internal server error" })
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Action, Scope};

    #[test]
    fn test_status_mapping() {
        assert_eq!(AuthError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::Forbidden(Permission::new("audit", Action::Read, Scope::All)).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::Session(anyhow::anyhow!("store offline")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
