use anyhow::Context;
use cms_admin_api::{create_router, AppState};
use cms_config::{AppConfig, AuthConfig, DatabaseConfig, LogFormat, LoggingConfig};
use cms_core::{entity::users, CmsError, NewUser};
use cms_middleware::{MemorySessionStore, Role, SessionStore};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 初始化日志，`RUST_LOG` 优先于配置里的级别
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("invalid log level `{}`", config.level))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Pretty => registry.with(fmt::layer()).try_init()?,
        LogFormat::Json => registry.with(fmt::layer().json()).try_init()?,
    }
    Ok(())
}

/// 连接数据库并建表
pub async fn connect_database(config: &DatabaseConfig) -> anyhow::Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(config.url.clone());
    opts.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .sqlx_logging(config.sqlx_logging);

    let db = Database::connect(opts)
        .await
        .with_context(|| format!("failed to connect to {}", config.url))?;
    cms_core::init_schema(&db).await?;
    info!("Database ready");
    Ok(db)
}

#[cfg(feature = "redis-session")]
fn session_store(config: &AuthConfig) -> anyhow::Result<Arc<dyn SessionStore>> {
    match &config.redis_url {
        Some(url) => {
            let store = cms_middleware::RedisSessionStore::new(
                url,
                Duration::from_secs(config.session_idle_secs),
            )?;
            info!("Using Redis session store");
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemorySessionStore::new())),
    }
}

#[cfg(not(feature = "redis-session"))]
fn session_store(config: &AuthConfig) -> anyhow::Result<Arc<dyn SessionStore>> {
    if config.redis_url.is_some() {
        warn!("auth.redis_url is set but the redis-session feature is disabled, using in-memory sessions");
    }
    Ok(Arc::new(MemorySessionStore::new()))
}

/// 根据配置组装应用状态
pub fn build_state(db: DatabaseConnection, config: &AppConfig) -> anyhow::Result<AppState> {
    let store = session_store(&config.auth)?;
    Ok(AppState::with_session_store(db, &config.auth, store).with_metrics(config.metrics.enabled))
}

/// 启动 HTTP 服务，直到收到关闭信号
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    if config.auth.trust_proxy_headers {
        info!("Client addresses are taken from X-Forwarded-For / X-Real-IP");
    }
    if config.auth.uses_dev_secret() {
        warn!("Using the built-in development JWT secret, set auth.jwt_secret before deploying");
    }

    let db = connect_database(&config.database).await?;
    let state = build_state(db, &config)?;

    let cleanup_period = Duration::from_secs(config.auth.session_cleanup_secs);
    let session_cleanup = state.sessions.clone().start_cleanup_task(cleanup_period);
    let limiter_cleanup = state.login_limiter.start_cleanup_task(cleanup_period);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(addr = %addr, "CMS admin API listening");

    // 对端地址用于登录限流和审计中的客户端 IP
    let app = create_router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    session_cleanup.abort();
    limiter_cleanup.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// 创建用户，角色必须是已知角色
pub async fn create_user(
    db: DatabaseConnection,
    config: &AuthConfig,
    new_user: NewUser,
) -> anyhow::Result<users::Model> {
    let role: Role = new_user.role.parse()?;
    let service = cms_core::UserService::new(db, config.bcrypt_cost);
    let user = service
        .create(NewUser {
            role: role.to_string(),
            ..new_user
        })
        .await?;
    Ok(user)
}

/// 按 id 或邮箱定位用户
#[derive(Debug, Clone)]
pub enum UserRef {
    Id(String),
    Email(String),
}

/// 启用或停用用户
pub async fn set_user_active(
    db: DatabaseConnection,
    config: &AuthConfig,
    user: UserRef,
    active: bool,
) -> anyhow::Result<users::Model> {
    let service = cms_core::UserService::new(db, config.bcrypt_cost);
    let id = match user {
        UserRef::Id(id) => id,
        UserRef::Email(email) => {
            service
                .find_by_email(&email)
                .await?
                .ok_or_else(|| CmsError::NotFound(format!("user {}", email)))?
                .id
        }
    };
    Ok(service.set_active(&id, active).await?)
}
