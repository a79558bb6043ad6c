//! REST API for the sentinel hub
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **Shared components** (limiter, dispatcher, health service) in [`ApiState`]
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Liveness and storage status
//! - `POST /api/v1/tick` - Run one dispatcher tick (`?at=<RFC 3339>` to replay)
//! - `POST /api/v1/rate-limit/check` - Check and record an attempt
//! - `DELETE /api/v1/rate-limit/:subject` - Forget all windows of a subject
//! - `POST /api/v1/health-check` - Run a link health check now
//! - `GET /api/v1/health-check/runs/:run_id` - Records of one run
//! - `GET /api/v1/jobs/runs` - Recent job run reports

#[cfg(feature = "api")]
pub mod error;
#[cfg(feature = "api")]
pub mod middleware;
#[cfg(feature = "api")]
pub mod routes;
#[cfg(feature = "api")]
pub mod state;
#[cfg(feature = "api")]
pub mod types;

#[cfg(feature = "api")]
pub use error::{ApiError, ApiResult};
#[cfg(feature = "api")]
pub use state::ApiState;
#[cfg(feature = "api")]
pub use types::{
    ClearSubjectResponse, HealthCheckResponse, HealthResponse, HealthRunResponse,
    JobRunsResponse, RateLimitCheckRequest, RateLimitCheckResponse,
};

#[cfg(feature = "api")]
use axum::{
    Router,
    routing::{delete, get, post},
};
use std::net::SocketAddr;
#[cfg(feature = "api")]
use tracing::info;

use crate::config::ApiSettings;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind_addr: SocketAddr,

    /// Optional authentication token
    pub auth_token: Option<String>,

    /// Enable permissive CORS
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiSettings::default().into()
    }
}

impl From<ApiSettings> for ApiConfig {
    fn from(settings: ApiSettings) -> Self {
        Self {
            bind_addr: settings.bind_addr,
            auth_token: settings.auth_token,
            enable_cors: settings.enable_cors,
        }
    }
}

/// Build the router with all routes and layers
#[cfg(feature = "api")]
pub fn router(config: &ApiConfig, state: ApiState) -> Router {
    use tower::ServiceBuilder;
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let mut app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/tick", post(routes::tick::run_tick))
        .route(
            "/api/v1/rate-limit/check",
            post(routes::rate_limit::check_rate_limit),
        )
        .route(
            "/api/v1/rate-limit/:subject",
            delete(routes::rate_limit::clear_subject),
        )
        .route(
            "/api/v1/health-check",
            post(routes::health_check::run_health_check),
        )
        .route(
            "/api/v1/health-check/runs/:run_id",
            get(routes::health_check::get_health_run),
        )
        .route("/api/v1/jobs/runs", get(routes::jobs::list_job_runs))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    // Add CORS if enabled
    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    // Add auth middleware if token provided
    if let Some(token) = config.auth_token.clone() {
        app = app.layer(axum::middleware::from_fn_with_state(
            token,
            middleware::auth::auth_middleware,
        ));
    }

    app
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
#[cfg(feature = "api")]
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(&config, state);

    // Bind and serve
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    // Spawn server in background
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
