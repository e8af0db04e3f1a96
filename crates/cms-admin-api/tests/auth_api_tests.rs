mod test_helpers;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use cms_config::AuthConfig;
use cms_core::{security::event_types, AuditLogFilter, AuditOutcome, SecurityEventFilter};
use serde_json::json;
use test_helpers::*;

fn login_body(email: &str, password: &str) -> Body {
    Body::from(json!({ "email": email, "password": password }).to_string())
}

/// 直连（无代理头）的登录请求
fn login_request(email: &str, password: &str, ip: &str) -> Request<Body> {
    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(login_body(email, password))
        .unwrap();
    from_peer(request, ip)
}

/// 经过代理的登录请求
fn proxied_login_request(email: &str, password: &str, peer: &str, forwarded_for: &str) -> Request<Body> {
    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", forwarded_for)
        .body(login_body(email, password))
        .unwrap();
    from_peer(request, peer)
}

async fn login_failed_ips(app: &TestApp) -> Vec<Option<String>> {
    app.state
        .security
        .list(&SecurityEventFilter {
            event_type: Some(event_types::LOGIN_FAILED.to_string()),
            ..Default::default()
        })
        .await
        .unwrap()
        .items
        .into_iter()
        .map(|e| e.ip_address)
        .collect()
}

#[tokio::test]
async fn test_login_sets_cookie_and_returns_token() {
    let app = create_test_app().await;
    create_user(&app, "admin@example.com", "admin").await;

    let response = send_raw(&app, login_request("admin@example.com", PASSWORD, "10.0.0.1")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with("cms_session="));
    assert!(cookie.contains("HttpOnly"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["data"]["user"]["email"], "admin@example.com");
    assert_eq!(body["data"]["user"]["role"], "admin");
    assert!(body["data"]["user"].get("password_hash").is_none());
    assert!(body["data"]["expires_at"].is_string());

    // Cookie 也能用来认证
    let session_cookie = cookie.split(';').next().unwrap().to_string();
    let request = Request::builder()
        .uri("/api/auth/session")
        .header(header::COOKIE, session_cookie)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "admin@example.com");
    assert_eq!(body["data"]["role"], "admin");
}

#[tokio::test]
async fn test_invalid_credentials() {
    let app = create_test_app().await;
    create_user(&app, "editor@example.com", "editor").await;

    let (status, body) = send(&app, login_request("editor@example.com", "wrong password", "10.0.0.2")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Invalid credentials" }));

    // 未知账号给出同样的回答
    let (status, body) = send(&app, login_request("ghost@example.com", "whatever", "10.0.0.2")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Invalid credentials" }));

    let failures = app
        .state
        .audit
        .list(&AuditLogFilter {
            outcome: Some(AuditOutcome::Failure),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(failures.total, 2);

    let events = app
        .state
        .security
        .list(&SecurityEventFilter {
            event_type: Some(event_types::LOGIN_FAILED.to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(events.total, 2);
    assert_eq!(events.items[0].ip_address.as_deref(), Some("10.0.0.2"));
}

#[tokio::test]
async fn test_login_request_validation() {
    let app = create_test_app().await;

    let (status, body) = send(&app, login_request("not-an-email", "", "10.0.0.3")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["email", "password"]);
}

#[tokio::test]
async fn test_inactive_user_cannot_login() {
    let app = create_test_app().await;
    let user = create_user(&app, "former@example.com", "editor").await;
    app.state.users.set_active(&user.id, false).await.unwrap();

    let (status, _) = send(&app, login_request("former@example.com", PASSWORD, "10.0.0.4")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = create_test_app().await;
    let token = login_as(&app, "author@example.com", "author").await;

    let (status, _) = send(&app, get("/api/auth/session", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);

    let response = send_raw(&app, post_json("/api/auth/logout", Some(&token), &json!({}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));

    // 签名仍然有效，但会话已经删除
    let (status, _) = send(&app, get("/api/auth/session", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, post_json("/api/auth/logout", Some(&token), &json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let logouts = app
        .state
        .audit
        .list(&AuditLogFilter {
            action: Some("auth.logout".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(logouts.total, 1);
}

#[tokio::test]
async fn test_login_is_throttled() {
    let app = create_test_app_with(AuthConfig {
        login_max_attempts: 3,
        ..test_auth_config()
    })
    .await;
    create_user(&app, "target@example.com", "admin").await;

    for _ in 0..3 {
        let (status, _) = send(&app, login_request("target@example.com", "guess", "203.0.113.9")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // 正确密码也会被拒绝
    let response = send_raw(&app, login_request("target@example.com", PASSWORD, "203.0.113.9")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "300");

    // 换客户端地址仍然受账号维度限制
    let (status, _) = send(&app, login_request("target@example.com", PASSWORD, "203.0.113.10")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let throttled = app
        .state
        .security
        .list(&SecurityEventFilter {
            event_type: Some(event_types::LOGIN_THROTTLED.to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(throttled.total, 2);
}

#[tokio::test]
async fn test_own_audit_logs_are_scoped_to_caller() {
    let app = create_test_app().await;
    let alice = login_as(&app, "alice@example.com", "author").await;
    let _bob = login_as(&app, "bob@example.com", "author").await;

    let (status, body) = send(&app, get("/api/admin/audit/me?limit=5", Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["limit"], 5);
    assert_eq!(body["data"][0]["action"], "auth.login");
}

#[tokio::test]
async fn test_direct_client_is_throttled_by_peer_address() {
    let app = create_test_app().await;

    // 每次换账号，只有 IP 维度会累积
    for i in 0..5 {
        let email = format!("guess{}@example.com", i);
        let (status, _) = send(&app, login_request(&email, "guess", "192.0.2.77")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let response = send_raw(&app, login_request("guess9@example.com", "guess", "192.0.2.77")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "300");

    // 其他客户端不受影响
    let (status, _) = send(&app, login_request("guess9@example.com", "guess", "192.0.2.78")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let ips = login_failed_ips(&app).await;
    assert_eq!(ips.len(), 6);
    assert!(ips.iter().all(|ip| ip.is_some()));
}

#[tokio::test]
async fn test_forwarded_header_is_ignored_by_default() {
    let app = create_test_app().await;

    for i in 0..5 {
        let email = format!("rotate{}@example.com", i);
        let forwarded = format!("203.0.113.{}", i + 1);
        let (status, _) =
            send(&app, proxied_login_request(&email, "guess", "192.0.2.80", &forwarded)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // 伪造的 X-Forwarded-For 换不出新的额度
    let (status, _) = send(
        &app,
        proxied_login_request("rotate9@example.com", "guess", "192.0.2.80", "203.0.113.99"),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let ips = login_failed_ips(&app).await;
    assert!(ips.iter().all(|ip| ip.as_deref() == Some("192.0.2.80")));
}

#[tokio::test]
async fn test_forwarded_header_is_used_behind_trusted_proxy() {
    let app = create_test_app_with(AuthConfig {
        trust_proxy_headers: true,
        ..test_auth_config()
    })
    .await;

    let (status, _) = send(
        &app,
        proxied_login_request("client@example.com", "guess", "10.0.0.1", "203.0.113.50, 10.0.0.1"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 代理没有带头时退回对端地址
    let (status, _) = send(&app, login_request("client@example.com", "guess", "10.0.0.1")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut ips = login_failed_ips(&app).await;
    ips.sort();
    assert_eq!(
        ips,
        vec![Some("10.0.0.1".to_string()), Some("203.0.113.50".to_string())]
    );
}
