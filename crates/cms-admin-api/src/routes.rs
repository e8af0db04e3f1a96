use axum::{
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use cms_middleware::{
    auth::{authenticated, resources},
    require_permissions, Action, Permission, Scope,
};
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::{handlers, state::AppState};

const AUDIT_READ_ALL: &[Permission] = &[Permission::new(resources::AUDIT, Action::Read, Scope::All)];
const AUDIT_READ_OWN: &[Permission] = &[Permission::new(resources::AUDIT, Action::Read, Scope::Own)];
const SECURITY_READ_ALL: &[Permission] =
    &[Permission::new(resources::SECURITY, Action::Read, Scope::All)];
const SECURITY_CREATE_ALL: &[Permission] =
    &[Permission::new(resources::SECURITY, Action::Create, Scope::All)];
const SYSTEM_READ_ALL: &[Permission] = &[Permission::new(resources::SYSTEM, Action::Read, Scope::All)];

/// 给一组路由加上权限检查
fn guarded(state: &AppState, required: &'static [Permission], router: Router<AppState>) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(
        state.auth.clone(),
        require_permissions(required),
    ))
}

/// 记录 HTTP 请求指标，按路由模板聚合
async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = req.method().to_string();

    let response = next.run(req).await;

    cms_metrics::global().record_http_request(
        &method,
        &route,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

/// 创建 API 路由
pub fn create_router(state: AppState) -> Router {
    // 公开接口
    let public = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/auth/login", post(handlers::login));

    // 只需要有效会话
    let session = Router::new()
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/auth/session", get(handlers::current_session))
        .route_layer(middleware::from_fn_with_state(state.auth.clone(), authenticated()));

    // 审计
    let audit = guarded(
        &state,
        AUDIT_READ_ALL,
        Router::new()
            .route("/api/admin/audit/stats", get(handlers::audit_stats))
            .route("/api/admin/audit/logs", get(handlers::list_audit_logs))
            .route("/api/admin/audit/logs/:id", get(handlers::get_audit_log)),
    );
    let audit_own = guarded(
        &state,
        AUDIT_READ_OWN,
        Router::new().route("/api/admin/audit/me", get(handlers::my_audit_logs)),
    );

    // 安全
    let security_read = guarded(
        &state,
        SECURITY_READ_ALL,
        Router::new()
            .route("/api/admin/security/stats", get(handlers::security_stats))
            .route("/api/admin/security/events", get(handlers::list_security_events)),
    );
    let security_write = guarded(
        &state,
        SECURITY_CREATE_ALL,
        Router::new().route("/api/admin/security/events", post(handlers::create_security_event)),
    );

    // 系统
    let system = guarded(
        &state,
        SYSTEM_READ_ALL,
        Router::new().route("/api/admin/metrics", get(handlers::export_metrics)),
    );

    Router::new()
        .merge(public)
        .merge(session)
        .merge(audit)
        .merge(audit_own)
        .merge(security_read)
        .merge(security_write)
        .merge(system)
        .route_layer(middleware::from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
