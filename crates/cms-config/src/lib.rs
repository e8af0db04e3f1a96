pub mod app;
pub mod error;
pub mod loader;

pub use app::{
    AppConfig, AuthConfig, DatabaseConfig, LogFormat, LoggingConfig, MetricsConfig, ServerConfig,
    DEV_JWT_SECRET,
};
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, ENV_PREFIX};
