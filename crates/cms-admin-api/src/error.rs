use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use cms_core::CmsError;
use cms_middleware::AuthError;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

/// 单个字段的校验错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// API 错误类型
#[derive(Debug, Error)]
pub enum ApiError {
    /// 参数校验失败，逐项列出
    #[error("validation failed: {0:?}")]
    Validation(Vec<FieldError>),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// 没有有效会话
    #[error("unauthorized")]
    Unauthorized,

    /// 登录凭据错误
    #[error("invalid credentials")]
    InvalidCredentials,

    /// 缺少权限
    #[error("forbidden: {required}")]
    Forbidden { required: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// 被限流
    #[error("too many requests")]
    TooManyRequests { retry_after_secs: u64 },

    /// 内部错误，只记录日志不返回细节
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation(fields) => json!({
                "error": "Validation failed",
                "details": fields,
            }),
            ApiError::BadRequest(msg) => json!({ "error": msg }),
            ApiError::Unauthorized => json!({ "error": "Unauthorized" }),
            ApiError::InvalidCredentials => json!({ "error": "Invalid credentials" }),
            ApiError::Forbidden { required } => json!({
                "error": "Forbidden",
                "details": { "required": required },
            }),
            ApiError::NotFound(what) => json!({ "error": format!("Not found: {}", what) }),
            ApiError::Conflict(what) => json!({ "error": format!("Already exists: {}", what) }),
            ApiError::TooManyRequests { retry_after_secs } => json!({
                "error": "Too many requests",
                "details": { "retry_after_secs": retry_after_secs },
            }),
            ApiError::Internal(detail) => {
                error!(error = %detail, "Request failed with internal error");
                json!({ "error": "Internal server error" })
            }
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::TooManyRequests { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

impl From<CmsError> for ApiError {
    fn from(err: CmsError) -> Self {
        match err {
            CmsError::NotFound(what) => ApiError::NotFound(what),
            CmsError::AlreadyExists(what) => ApiError::Conflict(what),
            CmsError::Validation { field, message } => {
                ApiError::Validation(vec![FieldError { field, message }])
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed `{}` check", e.code));
                    FieldError::new(field, message)
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::Validation(fields)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated => ApiError::Unauthorized,
            AuthError::Forbidden(missing) => ApiError::Forbidden {
                required: missing.to_string(),
            },
            other => ApiError::Internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;
    use validator::Validate;

    #[derive(Validate)]
    struct DaysParam {
        #[validate(range(min = 1, max = 365, message = "must be between 1 and 365"))]
        days: u32,
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_errors_are_itemized() {
        let err: ApiError = DaysParam { days: 400 }.validate().unwrap_err().into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["details"][0]["field"], "days");
        assert_eq!(body["details"][0]["message"], "must be between 1 and 365");
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let response = ApiError::internal("connection reset by peer").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body, json!({ "error": "Internal server error" }));
    }

    #[tokio::test]
    async fn test_throttled_sets_retry_after() {
        let response = ApiError::TooManyRequests { retry_after_secs: 300 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "300");
    }

    #[test]
    fn test_cms_error_mapping() {
        assert_eq!(
            ApiError::from(CmsError::NotFound("audit log x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(CmsError::validation("days", "out of range")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(CmsError::internal("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
