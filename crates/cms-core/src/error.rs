use thiserror::Error;

/// CMS Core 统一错误类型
#[derive(Error, Debug)]
pub enum CmsError {
    /// 记录未找到
    #[error("Not found: {0}")]
    NotFound(String),

    /// 记录已存在
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// 字段校验失败
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Password hashing error: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, CmsError>;

impl CmsError {
    /// 创建校验错误
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CmsError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 创建内部错误
    pub fn internal(msg: impl Into<String>) -> Self {
        CmsError::Internal(msg.into())
    }
}

impl From<tokio::task::JoinError> for CmsError {
    fn from(err: tokio::task::JoinError) -> Self {
        CmsError::Internal(format!("blocking task failed: {}", err))
    }
}
