use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use cms_core::{AuditLogFilter, AuditStats};
use cms_middleware::AuthUser;
use tracing::debug;

use crate::extractors::ValidatedQuery;
use crate::models::{AuditLogQuery, AuditLogResponse, DataResponse, ListResponse, PageQuery, StatsQuery};
use crate::{state::AppState, Result};

/// 审计统计
pub async fn audit_stats(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<StatsQuery>,
) -> Result<Json<DataResponse<AuditStats>>> {
    debug!(days = query.days(), "Computing audit stats");

    let stats = state.audit.stats(query.days(), Utc::now()).await?;
    Ok(Json(DataResponse::new(stats)))
}

/// 审计日志列表
pub async fn list_audit_logs(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<AuditLogQuery>,
) -> Result<Json<ListResponse<AuditLogResponse>>> {
    let filter = query.into_filter()?;
    let page = state.audit.list(&filter).await?;
    Ok(Json(page.map(AuditLogResponse::from).into()))
}

/// 单条审计日志
pub async fn get_audit_log(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<AuditLogResponse>>> {
    let log = state.audit.get(&id).await?;
    Ok(Json(DataResponse::new(log.into())))
}

/// 当前用户自己的审计日志
pub async fn my_audit_logs(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedQuery(query): ValidatedQuery<PageQuery>,
) -> Result<Json<ListResponse<AuditLogResponse>>> {
    let filter = AuditLogFilter {
        user_id: Some(user.user_id),
        limit: query.limit,
        offset: query.offset,
        ..Default::default()
    };
    let page = state.audit.list(&filter).await?;
    Ok(Json(page.map(AuditLogResponse::from).into()))
}
