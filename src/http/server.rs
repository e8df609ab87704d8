//! Demo HTTP server with the rate limit layer in front.

use std::net::SocketAddr;

use axum::error_handling::HandleErrorLayer;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Extension, Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower::{BoxError, ServiceBuilder};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::headers::RateLimitInfo;
use super::layer::RateLimitLayer;
use crate::error::{HitguardError, Result};

/// HTTP server serving a rate limited router.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Rate limit layer applied to the public routes
    layer: RateLimitLayer,
}

impl HttpServer {
    /// Create a new server.
    pub fn new(addr: SocketAddr, layer: RateLimitLayer) -> Self {
        Self { addr, layer }
    }

    /// Start the server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, "Starting HTTP server");

        axum::serve(
            listener,
            router(self.layer).into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            HitguardError::Server(e.to_string())
        })
    }
}

/// Build the router: rate limited public routes plus unlimited health and
/// admin routes.
pub fn router(layer: RateLimitLayer) -> Router {
    let limited = Router::new()
        .route("/", get(index))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_limiter_error))
                .layer(layer.clone()),
        );

    Router::new()
        .route("/health", get(health))
        .route("/limits/:key", delete(reset_limit))
        .with_state(layer)
        .merge(limited)
        .layer(TraceLayer::new_for_http())
}

async fn index(Extension(info): Extension<RateLimitInfo>) -> impl IntoResponse {
    Json(json!({
        "limit": info.limit,
        "used": info.current,
        "remaining": info.remaining,
        "reset_time": info.reset_time_iso(),
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "hitguard",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn reset_limit(State(layer): State<RateLimitLayer>, Path(key): Path<String>) -> impl IntoResponse {
    match layer.reset_key(&key).await {
        Ok(()) => {
            info!(key = %key, "Rate limit reset by admin request");
            StatusCode::NO_CONTENT
        }
        Err(e) => {
            error!(key = %key, error = %e, "Failed to reset rate limit");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Render limiter failures as a plain 500; they are never reported as 429.
async fn handle_limiter_error(err: BoxError) -> impl IntoResponse {
    error!(error = %err, "Rate limiter failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}
