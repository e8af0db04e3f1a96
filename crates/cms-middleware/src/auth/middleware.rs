use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::future::Future;
use std::pin::Pin;

use super::{with_authorization, AuthState, Permission};

type MiddlewareFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// 权限检查中间件生成器
///
/// 配合 `axum::middleware::from_fn_with_state` 使用：
///
/// ```ignore
/// Router::new()
///     .route("/stats", get(stats))
///     .route_layer(from_fn_with_state(auth, require_permissions(AUDIT_READ_ALL)))
/// ```
pub fn require_permissions(
    required: &'static [Permission],
) -> impl Fn(State<AuthState>, Request, Next) -> MiddlewareFuture + Clone + Send + 'static {
    move |State(auth): State<AuthState>, req: Request, next: Next| {
        Box::pin(async move {
            with_authorization(&auth, required, req, |req| next.run(req)).await
        })
    }
}

/// 只要求有效会话
pub fn authenticated(
) -> impl Fn(State<AuthState>, Request, Next) -> MiddlewareFuture + Clone + Send + 'static {
    require_permissions(&[])
}
