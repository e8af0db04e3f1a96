use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::entity::users;
use crate::{CmsError, Result};

/// 密码最小长度
pub const MIN_PASSWORD_LEN: usize = 8;

const DUMMY_PASSWORD: &str = "cms-placeholder-password";

/// 新建用户参数
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub role: String,
}

/// 用户服务
///
/// 只负责登录所需的身份数据；角色名的合法性由调用方保证。
#[derive(Clone)]
pub struct UserService {
    db: DatabaseConnection,
    bcrypt_cost: u32,
    dummy_hash: Arc<OnceCell<String>>,
}

impl UserService {
    pub fn new(db: DatabaseConnection, bcrypt_cost: u32) -> Self {
        Self {
            db,
            bcrypt_cost,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// 创建用户
    ///
    /// # 错误
    /// * `Validation` - 邮箱或密码不合法
    /// * `AlreadyExists` - 邮箱已被占用
    pub async fn create(&self, new_user: NewUser) -> Result<users::Model> {
        let email = normalize_email(&new_user.email);
        if !validator::validate_email(email.as_str()) {
            return Err(CmsError::validation("email", "must be a valid email address"));
        }
        if new_user.password.len() < MIN_PASSWORD_LEN {
            return Err(CmsError::validation(
                "password",
                format!("must be at least {} characters", MIN_PASSWORD_LEN),
            ));
        }
        if self.find_by_email(&email).await?.is_some() {
            return Err(CmsError::AlreadyExists(email));
        }

        let cost = self.bcrypt_cost;
        let password = new_user.password;
        let password_hash =
            tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;

        let user = users::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            email: Set(email),
            name: Set(new_user.name),
            password_hash: Set(password_hash),
            role: Set(new_user.role),
            active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await?;

        info!(user_id = %user.id, email = %user.email, role = %user.role, "User created");
        Ok(user)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<users::Model>> {
        Ok(users::Entity::find_by_id(id.to_string()).one(&self.db).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        Ok(users::Entity::find()
            .filter(users::Column::Email.eq(normalize_email(email)))
            .one(&self.db)
            .await?)
    }

    /// 校验邮箱和密码
    ///
    /// 用户不存在、已停用或密码错误时返回 `None`。前两种情况也会对占位哈希做一次
    /// bcrypt 校验，使响应耗时不暴露账号是否存在。
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<Option<users::Model>> {
        match self.find_by_email(email).await? {
            Some(user) if user.active => {
                let valid = check_password(password, user.password_hash.clone()).await?;
                Ok(valid.then_some(user))
            }
            other => {
                match &other {
                    Some(user) => debug!(user_id = %user.id, "Login for inactive account"),
                    None => debug!(email = %email, "Login for unknown account"),
                }
                let hash = self.dummy_hash().await?.to_string();
                check_password(password, hash).await?;
                Ok(None)
            }
        }
    }

    /// 与真实账号同成本的占位哈希，首次使用时生成
    async fn dummy_hash(&self) -> Result<&str> {
        let cost = self.bcrypt_cost;
        let hash = self
            .dummy_hash
            .get_or_try_init(|| async move {
                let hash =
                    tokio::task::spawn_blocking(move || bcrypt::hash(DUMMY_PASSWORD, cost)).await??;
                Ok::<_, CmsError>(hash)
            })
            .await?;
        Ok(hash.as_str())
    }

    /// 启用或停用用户
    pub async fn set_active(&self, id: &str, active: bool) -> Result<users::Model> {
        let user = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| CmsError::NotFound(format!("user {}", id)))?;

        let mut model: users::ActiveModel = user.into();
        model.active = Set(active);
        let user = model.update(&self.db).await?;

        info!(user_id = %user.id, active = active, "User activation changed");
        Ok(user)
    }
}

async fn check_password(password: &str, hash: String) -> Result<bool> {
    let password = password.to_string();
    Ok(tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
