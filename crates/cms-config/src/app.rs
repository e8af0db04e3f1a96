use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::{ConfigError, Result};

/// 开发用的默认 JWT 密钥，生产环境必须覆盖
pub const DEV_JWT_SECRET: &str = "cms-dev-secret-change-me-before-deploying";

const MIN_SECRET_LEN: usize = 32;

/// 应用配置
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// 是否输出 sqlx 语句日志
    pub sqlx_logging: bool,
}

/// 认证与会话配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 签名密钥
    pub jwt_secret: String,
    /// 令牌有效期（秒）
    pub token_ttl_secs: u64,
    /// 会话空闲超时（秒）
    pub session_idle_secs: u64,
    /// 过期会话清理周期（秒）
    pub session_cleanup_secs: u64,
    pub cookie_name: String,
    /// Cookie 是否带 `Secure`
    pub cookie_secure: bool,
    pub bcrypt_cost: u32,
    /// 登录限流：窗口内最多尝试次数
    pub login_max_attempts: u64,
    /// 登录限流窗口（秒）
    pub login_window_secs: u64,
    /// 是否信任 `X-Forwarded-For` / `X-Real-IP`，仅在可信反向代理之后开启
    pub trust_proxy_headers: bool,
    /// 会话存储使用的 Redis 地址，未设置时使用内存存储
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` 语法，`RUST_LOG` 优先
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://cms.db?mode=rwc".to_string(),
            max_connections: 10,
            min_connections: 1,
            sqlx_logging: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_secs: 8 * 3600,
            session_idle_secs: 2 * 3600,
            session_cleanup_secs: 300,
            cookie_name: "cms_session".to_string(),
            cookie_secure: false,
            bcrypt_cost: 12,
            login_max_attempts: 5,
            login_window_secs: 300,
            trust_proxy_headers: false,
            redis_url: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::invalid("server.host", format!("{}", e)))
    }
}

impl AuthConfig {
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

impl AppConfig {
    /// 校验取值范围
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port", "must be greater than 0"));
        }
        self.server.socket_addr()?;

        if self.database.url.trim().is_empty() {
            return Err(ConfigError::invalid("database.url", "must not be empty"));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::invalid("database.max_connections", "must be greater than 0"));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::invalid(
                "database.min_connections",
                format!("cannot exceed max_connections ({})", self.database.max_connections),
            ));
        }

        let auth = &self.auth;
        if auth.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::invalid(
                "auth.jwt_secret",
                format!("must be at least {} bytes", MIN_SECRET_LEN),
            ));
        }
        if auth.token_ttl_secs == 0 {
            return Err(ConfigError::invalid("auth.token_ttl_secs", "must be greater than 0"));
        }
        if auth.session_idle_secs == 0 {
            return Err(ConfigError::invalid("auth.session_idle_secs", "must be greater than 0"));
        }
        if auth.session_cleanup_secs == 0 {
            return Err(ConfigError::invalid("auth.session_cleanup_secs", "must be greater than 0"));
        }
        if auth.cookie_name.is_empty()
            || !auth.cookie_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::invalid(
                "auth.cookie_name",
                "must be non-empty and contain only [A-Za-z0-9_-]",
            ));
        }
        if !(4..=31).contains(&auth.bcrypt_cost) {
            return Err(ConfigError::invalid("auth.bcrypt_cost", "must be between 4 and 31"));
        }
        if auth.login_max_attempts == 0 {
            return Err(ConfigError::invalid("auth.login_max_attempts", "must be greater than 0"));
        }
        if auth.login_window_secs == 0 {
            return Err(ConfigError::invalid("auth.login_window_secs", "must be greater than 0"));
        }

        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid("logging.level", "must not be empty"));
        }

        Ok(())
    }

    /// 以 TOML 输出生效配置，密钥被遮盖
    pub fn to_toml(&self) -> Result<String> {
        let mut redacted = self.clone();
        redacted.auth.jwt_secret = "********".to_string();
        Ok(toml::to_string_pretty(&redacted)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.cookie_name, "cms_session");
        assert_eq!(config.auth.login_max_attempts, 5);
        assert!(config.auth.uses_dev_secret());
        assert!(!config.auth.trust_proxy_headers);
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "short".to_string();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "auth.jwt_secret", .. }));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.auth.login_window_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.auth.cookie_name = "bad name;".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.database.min_connections = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_to_toml_redacts_secret() {
        let rendered = AppConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[server]"));
        assert!(rendered.contains("format = \"pretty\""));
        assert!(!rendered.contains(DEV_JWT_SECRET));
    }
}
