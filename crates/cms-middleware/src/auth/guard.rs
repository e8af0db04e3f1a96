use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, Method},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{check_permissions, AuthError, Permission, Role};
use crate::session::{SessionData, SessionResolver};

/// 通过授权的调用者，附加在请求扩展上
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub session_id: String,
}

impl From<&SessionData> for AuthUser {
    fn from(session: &SessionData) -> Self {
        Self {
            user_id: session.user_id.clone(),
            email: session.email.clone(),
            role: session.role,
            session_id: session.session_id.clone(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}

/// 客户端地址的来源策略
///
/// 默认只信任 TCP 对端地址；部署在可信反向代理之后才应开启代理头。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientIpPolicy {
    pub trust_proxy_headers: bool,
}

/// 客户端信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ClientInfo {
    /// 提取客户端地址和 User-Agent
    ///
    /// 开启代理头时优先取 `X-Forwarded-For` 第一项，其次 `X-Real-IP`，最后退回对端地址。
    pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>, policy: ClientIpPolicy) -> Self {
        let proxied = if policy.trust_proxy_headers {
            forwarded_ip(headers)
        } else {
            None
        };
        let ip_address = proxied.or_else(|| peer.map(|addr| addr.ip().to_string()));

        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Self {
            ip_address,
            user_agent,
        }
    }

    /// 从请求头和连接信息中提取，对端地址来自 `ConnectInfo<SocketAddr>`
    pub fn from_parts(parts: &Parts, policy: ClientIpPolicy) -> Self {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Self::resolve(&parts.headers, peer, policy)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    ClientIpPolicy: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientInfo::from_parts(parts, ClientIpPolicy::from_ref(state)))
    }
}

/// 一次授权判定
#[derive(Debug, Clone, Serialize)]
pub struct AccessDecision {
    pub user_id: String,
    pub role: Role,
    pub method: String,
    pub path: String,
    pub required: Vec<Permission>,
    /// 第一个缺失的权限；`None` 表示放行
    pub missing: Option<Permission>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AccessDecision {
    pub fn granted(&self) -> bool {
        self.missing.is_none()
    }

    /// 判定所针对的资源
    pub fn resource(&self) -> &'static str {
        self.missing
            .or_else(|| self.required.first().copied())
            .map(|p| p.resource)
            .unwrap_or("session")
    }
}

/// 授权判定的审计出口
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record_decision(&self, decision: &AccessDecision) -> anyhow::Result<()>;
}

/// 授权所需的共享状态
#[derive(Clone)]
pub struct AuthState {
    resolver: Arc<dyn SessionResolver>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl AuthState {
    pub fn new(resolver: Arc<dyn SessionResolver>) -> Self {
        Self {
            resolver,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }
}

/// 拒绝总是审计；放行只审计有副作用的请求
fn should_audit(method: &Method, granted: bool, required: &[Permission]) -> bool {
    if required.is_empty() {
        return false;
    }
    !granted || !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// 解析会话并检查全部所需权限
///
/// # 错误
/// * `Unauthenticated` - 没有有效会话
/// * `Forbidden` - 角色缺少任一所需权限
/// * `Session` - 会话解析失败
pub async fn authorize(
    state: &AuthState,
    req: &Parts,
    required: &[Permission],
) -> Result<AuthUser, AuthError> {
    let session = state
        .resolver
        .resolve(&req.headers)
        .await?
        .ok_or(AuthError::Unauthenticated)?;

    let user = AuthUser::from(&session);
    let missing = check_permissions(user.role, required).err();

    let decision = AccessDecision {
        user_id: user.user_id.clone(),
        role: user.role,
        method: req.method.to_string(),
        path: req.uri.path().to_string(),
        required: required.to_vec(),
        missing,
        ip_address: session.ip_address.clone(),
        user_agent: session.user_agent.clone(),
    };
    cms_metrics::global().record_access_decision(decision.resource(), decision.granted());

    if let Some(sink) = &state.audit {
        if should_audit(&req.method, decision.granted(), required) {
            if let Err(e) = sink.record_decision(&decision).await {
                warn!(error = %e, user_id = %decision.user_id, "Failed to audit access decision");
            }
        }
    }

    match missing {
        None => {
            debug!(user_id = %user.user_id, path = %decision.path, "Access granted");
            Ok(user)
        }
        Some(permission) => {
            warn!(
                user_id = %user.user_id,
                role = %user.role,
                path = %decision.path,
                required = %permission,
                "Access denied"
            );
            Err(AuthError::Forbidden(permission))
        }
    }
}

/// 用授权包裹处理函数
///
/// 授权通过时把 [`AuthUser`] 放入请求扩展再调用 `handler`，否则直接返回错误响应。
pub async fn with_authorization<F, Fut>(
    state: &AuthState,
    required: &[Permission],
    req: Request,
    handler: F,
) -> Response
where
    F: FnOnce(Request) -> Fut,
    Fut: Future<Output = Response>,
{
    let (mut parts, body) = req.into_parts();
    match authorize(state, &parts, required).await {
        Ok(user) => {
            parts.extensions.insert(user);
            handler(Request::from_parts(parts, body)).await
        }
        Err(e) => e.into_response(),
    }
}
