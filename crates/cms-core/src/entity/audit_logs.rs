use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 审计日志（只追加）
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String, // UUID as String
    #[sea_orm(nullable)]
    pub user_id: Option<String>,
    pub action: String,
    pub resource: String,
    #[sea_orm(nullable)]
    pub resource_id: Option<String>,
    pub outcome: String,
    #[sea_orm(nullable)]
    pub ip_address: Option<String>,
    #[sea_orm(nullable)]
    pub user_agent: Option<String>,
    #[sea_orm(column_type = "Json", nullable)]
    pub details: Option<Json>,
    /// 毫秒时间戳
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
