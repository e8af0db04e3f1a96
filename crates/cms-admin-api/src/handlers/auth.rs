use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use cms_core::{security::event_types, AuditOutcome, NewAuditEntry, NewSecurityEvent, Severity};
use cms_middleware::{AuthUser, ClientInfo, RateLimitSubject, Role};
use serde_json::json;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::extractors::ValidatedJson;
use crate::models::{DataResponse, LoginRequest, LoginResponse, UserResponse};
use crate::{state::AppState, Result};

const SESSION_RESOURCE: &str = "session";

fn with_cookie(mut response: Response, cookie: &str) -> Result<Response> {
    let value = HeaderValue::from_str(cookie).map_err(ApiError::internal)?;
    response.headers_mut().insert(header::SET_COOKIE, value);
    Ok(response)
}

/// 登录
///
/// 先限流再校验密码；失败统一返回 `Invalid credentials`，不区分账号是否存在。
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Response> {
    let metrics = cms_metrics::global();
    let subject = RateLimitSubject {
        ip: client.ip_address.as_deref(),
        account: Some(req.email.as_str()),
    };

    if let Err(strategy) = state.login_limiter.check(&subject).await {
        metrics.record_login_attempt("throttled");
        state
            .security_quietly(
                NewSecurityEvent::new(
                    event_types::LOGIN_THROTTLED,
                    Severity::Medium,
                    format!("login throttled by {} limit", strategy),
                )
                .with_ip(client.ip_address.clone())
                .with_details(json!({ "email": req.email, "strategy": strategy })),
            )
            .await;
        return Err(ApiError::TooManyRequests {
            retry_after_secs: state.login_window_secs,
        });
    }

    let Some(user) = state.users.verify_credentials(&req.email, &req.password).await? else {
        metrics.record_login_attempt("failure");
        warn!(email = %req.email, ip = ?client.ip_address, "Login failed");
        state
            .audit_quietly(
                NewAuditEntry::new("auth.login", SESSION_RESOURCE, AuditOutcome::Failure)
                    .with_client(client.ip_address.clone(), client.user_agent.clone())
                    .with_details(json!({ "email": req.email })),
            )
            .await;
        state
            .security_quietly(
                NewSecurityEvent::new(event_types::LOGIN_FAILED, Severity::Low, "invalid credentials")
                    .with_ip(client.ip_address.clone())
                    .with_details(json!({ "email": req.email })),
            )
            .await;
        return Err(ApiError::InvalidCredentials);
    };

    let role: Role = user
        .role
        .parse()
        .map_err(|e| ApiError::Internal(format!("user {} has {}", user.id, e)))?;

    let session = state
        .sessions
        .create_session(
            user.id.clone(),
            user.email.clone(),
            role,
            client.ip_address.clone(),
            client.user_agent.clone(),
        )
        .await
        .map_err(ApiError::internal)?;
    let (token, expires_at) = state.tokens.issue(&session)?;

    metrics.record_login_attempt("success");
    state
        .audit_quietly(
            NewAuditEntry::new("auth.login", SESSION_RESOURCE, AuditOutcome::Success)
                .with_user(user.id.clone())
                .with_resource_id(session.session_id.clone())
                .with_client(client.ip_address.clone(), client.user_agent.clone()),
        )
        .await;
    info!(user_id = %user.id, role = %role, session_id = %session.session_id, "User logged in");

    let cookie = state.cookie.session_cookie(&token);
    let body = DataResponse::new(LoginResponse {
        user: UserResponse::from(user),
        token,
        expires_at,
    });
    with_cookie(Json(body).into_response(), &cookie)
}

/// 登出：删除服务端会话，令牌随之失效
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    client: ClientInfo,
) -> Result<Response> {
    state
        .sessions
        .delete_session(&user.session_id)
        .await
        .map_err(ApiError::internal)?;

    state
        .audit_quietly(
            NewAuditEntry::new("auth.logout", SESSION_RESOURCE, AuditOutcome::Success)
                .with_user(user.user_id.clone())
                .with_resource_id(user.session_id.clone())
                .with_client(client.ip_address, client.user_agent),
        )
        .await;
    info!(user_id = %user.user_id, session_id = %user.session_id, "User logged out");

    let body = DataResponse::new(json!({ "logged_out": true }));
    with_cookie(Json(body).into_response(), &state.cookie.clear_cookie())
}

/// 当前会话
pub async fn current_session(user: AuthUser) -> Json<DataResponse<AuthUser>> {
    Json(DataResponse::new(user))
}
