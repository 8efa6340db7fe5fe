//! HTTP surface of the collector
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **NodeRegistry** shared with the liveness sweeper
//! - **NotificationHandle** for queueing events produced by report ingestion
//!
//! ## Endpoints
//!
//! - `POST /api/report` - Report ingestion, authenticated by the shared secret in the body
//! - `GET /api/status` - Status of every known node, sorted by hostname
//! - `POST /api/test-notification` - Send a connectivity-test message (alias `/api/test-telegram`)
//! - `GET /api/health` - Health check
//!
//! When an admin token is configured, status and test-notification require
//! `Authorization: Bearer <token>`.

pub mod error;
pub mod middleware {
    pub mod auth;
}
pub mod routes {
    pub mod health;
    pub mod notify;
    pub mod report;
    pub mod status;
}
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::HealthResponse;

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::CollectorConfig;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind_addr: SocketAddr,

    /// Optional token guarding the administrative endpoints
    pub admin_token: Option<String>,

    pub enable_cors: bool,
}

impl ApiConfig {
    pub fn from_collector(config: &CollectorConfig) -> anyhow::Result<Self> {
        Ok(Self {
            bind_addr: config.listen_addr()?,
            admin_token: config
                .admin_token
                .clone()
                .filter(|token| !token.trim().is_empty()),
            enable_cors: true,
        })
    }
}

/// Build the router with all routes
pub fn router(config: &ApiConfig, state: ApiState) -> Router {
    let mut admin = Router::new()
        .route("/api/status", get(routes::status::node_status))
        .route(
            "/api/test-notification",
            post(routes::notify::test_notification),
        )
        .route("/api/test-telegram", post(routes::notify::test_notification));

    if let Some(token) = config.admin_token.clone() {
        admin = admin.route_layer(axum::middleware::from_fn_with_state(
            token,
            middleware::auth::auth_middleware,
        ));
    }

    let mut app = Router::new()
        .route("/api/report", post(routes::report::receive_report))
        .route("/api/health", get(routes::health::health_check))
        .merge(admin)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Spawn the API server
///
/// Binding failures are returned to the caller. The server stops accepting
/// connections once `shutdown` resolves and the returned task finishes after
/// in-flight requests completed.
pub async fn spawn_api_server<F>(
    config: ApiConfig,
    state: ApiState,
    shutdown: F,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("starting API server on {}", config.bind_addr);

    let app = router(&config, state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("API server error: {}", e);
        }
    });

    Ok((addr, task))
}
