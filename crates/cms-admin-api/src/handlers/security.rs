use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use cms_core::{NewSecurityEvent, SecurityStats};
use cms_middleware::AuthUser;
use serde_json::json;
use tracing::info;

use crate::extractors::{ValidatedJson, ValidatedQuery};
use crate::models::{
    CreateSecurityEventRequest, DataResponse, ListResponse, SecurityEventQuery,
    SecurityEventResponse, StatsQuery,
};
use crate::{state::AppState, Result};

/// 安全统计与威胁评估
pub async fn security_stats(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<StatsQuery>,
) -> Result<Json<DataResponse<SecurityStats>>> {
    let stats = state.security.stats(query.days(), Utc::now()).await?;
    Ok(Json(DataResponse::new(stats)))
}

/// 安全事件列表
pub async fn list_security_events(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<SecurityEventQuery>,
) -> Result<Json<ListResponse<SecurityEventResponse>>> {
    let filter = query.into_filter()?;
    let page = state.security.list(&filter).await?;
    Ok(Json(page.map(SecurityEventResponse::from).into()))
}

/// 手工上报安全事件
pub async fn create_security_event(
    State(state): State<AppState>,
    reporter: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateSecurityEventRequest>,
) -> Result<(StatusCode, Json<DataResponse<SecurityEventResponse>>)> {
    info!(
        reporter = %reporter.user_id,
        event_type = %req.event_type,
        severity = %req.severity,
        "Security event reported"
    );

    let mut details = req.details.unwrap_or_else(|| json!({}));
    if let Some(map) = details.as_object_mut() {
        map.insert("reported_by".to_string(), json!(reporter.user_id));
    }

    let mut event = NewSecurityEvent::new(req.event_type, req.severity, req.description)
        .with_ip(req.ip_address)
        .with_details(details);
    if let Some(user_id) = req.user_id {
        event = event.with_user(user_id);
    }

    let event = state.security.record(event).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(event.into()))))
}
