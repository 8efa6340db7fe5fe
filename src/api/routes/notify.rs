//! Notifier connectivity test

use axum::{Json, extract::State};
use tracing::instrument;

use crate::{
    ApiResponse,
    api::{ApiResult, ApiState},
    error::MonitorError,
};

/// POST /api/test-notification
///
/// Sends a fixed message through the configured notifier, independent of
/// any monitoring state.
#[instrument(skip_all)]
pub async fn test_notification(State(state): State<ApiState>) -> ApiResult<Json<ApiResponse>> {
    if !state.notifications.is_configured() {
        return Err(MonitorError::NotifierNotConfigured.into());
    }
    state.notifications.send_test().await?;
    Ok(Json(ApiResponse::ok("test message sent", None)))
}
