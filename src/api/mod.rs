//! HTTP surface of the hub
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check with the number of streaming clients
//! - `GET /api/stats` - Snapshot collected on demand
//! - `GET /api/stats/sse` - Server-sent events, one frame per broadcast snapshot

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::HealthResponse;

use std::net::{Ipv4Addr, SocketAddr};

use axum::{Router, routing::get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address, port 0 picks a free port
    pub bind_addr: SocketAddr,

    /// Allow cross-origin dashboards
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            enable_cors: true,
        }
    }
}

pub fn router(state: ApiState, enable_cors: bool) -> Router {
    let mut app = Router::new()
        .route("/api/health", get(routes::health::health_check))
        .route("/api/stats", get(routes::stats::get_stats))
        .route("/api/stats/sse", get(routes::stats::stream_stats))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
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
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(state, config.enable_cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
