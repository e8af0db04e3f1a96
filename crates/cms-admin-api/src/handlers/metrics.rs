use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use crate::{error::ApiError, state::AppState, Result};

/// 导出 Prometheus 文本格式指标
pub async fn export_metrics(State(state): State<AppState>) -> Result<Response> {
    if !state.metrics_enabled {
        return Err(ApiError::NotFound("metrics are disabled".to_string()));
    }

    let body = cms_metrics::global().export().map_err(ApiError::internal)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}
