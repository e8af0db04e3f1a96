use cms_config::AuthConfig;
use cms_core::{AuditLogService, NewAuditEntry, NewSecurityEvent, SecurityEventService, UserService};
use axum::extract::FromRef;
use cms_middleware::{
    AuthState, ClientIpPolicy, MemorySessionStore, RateLimitStrategy, RateLimiter, SessionManager, SessionStore,
    SessionTokens, TokenSessionResolver,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::audit_sink::DbAuditSink;

/// 会话 Cookie 设置
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
    pub max_age_secs: u64,
}

impl CookieSettings {
    /// 登录成功后下发的 Cookie
    pub fn session_cookie(&self, token: &str) -> String {
        self.render(token, self.max_age_secs)
    }

    /// 登出时清除 Cookie
    pub fn clear_cookie(&self) -> String {
        self.render("", 0)
    }

    fn render(&self, value: &str, max_age: u64) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
            self.name, value, max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// API 应用状态
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub users: UserService,
    pub audit: AuditLogService,
    pub security: SecurityEventService,
    pub sessions: Arc<SessionManager>,
    pub tokens: Arc<SessionTokens>,
    pub login_limiter: RateLimiter,
    pub login_window_secs: u64,
    pub auth: AuthState,
    pub cookie: CookieSettings,
    pub client_ip: ClientIpPolicy,
    pub metrics_enabled: bool,
}

impl FromRef<AppState> for ClientIpPolicy {
    fn from_ref(state: &AppState) -> Self {
        state.client_ip
    }
}

impl AppState {
    /// 使用内存会话存储创建状态
    pub fn new(db: DatabaseConnection, config: &AuthConfig) -> Self {
        Self::with_session_store(db, config, Arc::new(MemorySessionStore::new()))
    }

    pub fn with_session_store(
        db: DatabaseConnection,
        config: &AuthConfig,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let users = UserService::new(db.clone(), config.bcrypt_cost);
        let audit = AuditLogService::new(db.clone());
        let security = SecurityEventService::new(db.clone());

        let sessions = Arc::new(SessionManager::new(
            store,
            Duration::from_secs(config.session_idle_secs),
        ));
        let tokens = Arc::new(SessionTokens::new(
            config.jwt_secret.clone(),
            config.token_ttl_secs as i64,
        ));

        let resolver = TokenSessionResolver::new(tokens.clone(), sessions.clone(), config.cookie_name.clone());
        let auth = AuthState::new(Arc::new(resolver))
            .with_audit(Arc::new(DbAuditSink::new(audit.clone(), security.clone())));

        let login_limiter = RateLimiter::new(vec![
            RateLimitStrategy::by_ip(config.login_max_attempts, config.login_window_secs),
            RateLimitStrategy::by_account(config.login_max_attempts, config.login_window_secs),
        ]);

        Self {
            db,
            users,
            audit,
            security,
            sessions,
            tokens,
            login_limiter,
            login_window_secs: config.login_window_secs,
            auth,
            cookie: CookieSettings {
                name: config.cookie_name.clone(),
                secure: config.cookie_secure,
                max_age_secs: config.token_ttl_secs,
            },
            client_ip: ClientIpPolicy {
                trust_proxy_headers: config.trust_proxy_headers,
            },
            metrics_enabled: true,
        }
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    /// 写审计日志，失败只告警不影响请求
    pub async fn audit_quietly(&self, entry: NewAuditEntry) {
        let action = entry.action.clone();
        if let Err(e) = self.audit.record(entry).await {
            warn!(error = %e, action = %action, "Failed to write audit log");
        }
    }

    /// 写安全事件，失败只告警不影响请求
    pub async fn security_quietly(&self, event: NewSecurityEvent) {
        let event_type = event.event_type.clone();
        if let Err(e) = self.security.record(event).await {
            warn!(error = %e, event_type = %event_type, "Failed to write security event");
        }
    }
}
