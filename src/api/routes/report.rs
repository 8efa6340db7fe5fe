//! Report ingestion endpoint

use axum::{Json, body::Bytes, extract::State};
use tracing::{debug, instrument, warn};

use crate::{
    ApiResponse, ReportRequest,
    api::{ApiResult, ApiState},
    error::MonitorError,
};

/// POST /api/report
///
/// Rejected reports leave the registry untouched. Events produced by an
/// accepted report are queued for notification by the registry itself.
#[instrument(skip_all)]
pub async fn receive_report(
    State(state): State<ApiState>,
    body: Bytes,
) -> ApiResult<Json<ApiResponse>> {
    let request: ReportRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!("rejecting malformed report: {e}");
        MonitorError::DecodeFailure(e.to_string())
    })?;

    if request.password != *state.password {
        warn!("rejecting report from {}: wrong secret", request.hostname);
        return Err(MonitorError::AuthenticationFailure.into());
    }

    if request.hostname.trim().is_empty() {
        return Err(MonitorError::DecodeFailure("hostname must not be empty".to_string()).into());
    }

    let outcome = state
        .registry
        .upsert(&request.hostname, request.reading())
        .await;

    debug!(
        "report from {} accepted ({} event(s))",
        request.hostname,
        outcome.events.len()
    );

    Ok(Json(ApiResponse::ok("report received", None)))
}
