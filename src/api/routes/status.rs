//! Node status export

use std::collections::BTreeMap;

use axum::{Json, extract::State};

use crate::{ApiResponse, api::ApiState, registry::NodeStatus};

/// GET /api/status
pub async fn node_status(
    State(state): State<ApiState>,
) -> Json<ApiResponse<BTreeMap<String, NodeStatus>>> {
    let nodes = state.registry.snapshot_all().await;
    Json(ApiResponse::ok("status retrieved", Some(nodes)))
}
