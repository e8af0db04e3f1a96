#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use cms_admin_api::{create_router, AppState};
use cms_config::AuthConfig;
use cms_core::{entity::users, NewUser};
use sea_orm::{ConnectOptions, Database};
use serde_json::Value;
use std::net::SocketAddr;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct horse battery";

/// 测试请求默认的对端地址
pub const PEER_IP: &str = "198.51.100.20";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

/// 测试用认证配置：低 bcrypt 成本
pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        bcrypt_cost: 4,
        ..AuthConfig::default()
    }
}

/// 创建使用内存 SQLite 的应用
pub async fn create_test_app() -> TestApp {
    create_test_app_with(test_auth_config()).await
}

pub async fn create_test_app_with(config: AuthConfig) -> TestApp {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opts).await.expect("Failed to create test database");
    cms_core::init_schema(&db).await.expect("Failed to create tables");

    let state = AppState::new(db, &config);
    TestApp {
        router: create_router(state.clone()),
        state,
    }
}

pub async fn create_user(app: &TestApp, email: &str, role: &str) -> users::Model {
    app.state
        .users
        .create(NewUser {
            email: email.to_string(),
            password: PASSWORD.to_string(),
            name: None,
            role: role.to_string(),
        })
        .await
        .expect("Failed to create user")
}

/// 模拟 `into_make_service_with_connect_info` 注入的对端地址
pub fn from_peer(mut request: Request<Body>, ip: &str) -> Request<Body> {
    let addr: SocketAddr = format!("{}:40000", ip).parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    from_peer(builder.body(Body::empty()).unwrap(), PEER_IP)
}

pub fn post_json(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    from_peer(builder.body(Body::from(body.to_string())).unwrap(), PEER_IP)
}

pub async fn send_raw(app: &TestApp, request: Request<Body>) -> Response {
    app.router.clone().oneshot(request).await.unwrap()
}

/// 发送请求，返回状态码和 JSON 响应体（非 JSON 时为 Null）
pub async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = send_raw(app, request).await;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

/// 创建用户并登录，返回令牌
pub async fn login_as(app: &TestApp, email: &str, role: &str) -> String {
    create_user(app, email, role).await;
    let (status, body) = send(
        app,
        post_json(
            "/api/auth/login",
            None,
            &serde_json::json!({ "email": email, "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["data"]["token"].as_str().unwrap().to_string()
}
