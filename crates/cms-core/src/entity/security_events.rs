use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 安全事件（只追加）
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "security_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub event_type: String,
    pub severity: String,
    #[sea_orm(nullable)]
    pub user_id: Option<String>,
    #[sea_orm(nullable)]
    pub ip_address: Option<String>,
    pub description: String,
    #[sea_orm(column_type = "Json", nullable)]
    pub details: Option<Json>,
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
