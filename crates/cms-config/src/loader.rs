use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};

use crate::{AppConfig, ConfigError, Result};

/// 环境变量前缀，例如 `CMS__SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "CMS";

const DEFAULT_CONFIG_FILE: &str = "cms.toml";

/// 配置加载器
///
/// 优先级：环境变量 > 配置文件 > 默认值。
pub struct ConfigLoader {
    path: PathBuf,
    required: bool,
    env_overrides: Option<config::Map<String, String>>,
}

impl ConfigLoader {
    /// 使用默认配置文件 `cms.toml`（可以不存在）
    pub fn new() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CONFIG_FILE),
            required: false,
            env_overrides: None,
        }
    }

    /// 使用指定配置文件（必须存在）
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            required: true,
            env_overrides: None,
        }
    }

    /// 用给定的变量表代替进程环境
    pub fn with_env<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env_overrides = Some(vars.into_iter().collect());
        self
    }

    /// 加载并校验配置
    pub fn load(&self) -> Result<AppConfig> {
        let path = self
            .path
            .to_str()
            .ok_or_else(|| ConfigError::invalid("config", "path is not valid UTF-8"))?;

        let config = Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(self.required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(self.env_overrides.clone()),
            )
            .build()?;

        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
