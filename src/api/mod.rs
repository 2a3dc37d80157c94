//! Liveness HTTP endpoint.
//!
//! Hosting platforms require a bound port to consider a web service
//! healthy. This listener serves exactly one route: `GET /` answers a
//! static string, always, regardless of job health. It carries no
//! business semantics.

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// What `GET /` always answers.
pub const LIVENESS_BODY: &str = "service is running";

/// Configuration for the liveness server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: crate::config::DEFAULT_PORT,
        }
    }
}

impl ApiConfig {
    /// Create a new config with custom host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Get the socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

async fn liveness() -> &'static str {
    LIVENESS_BODY
}

/// Build the liveness router.
pub fn build_router() -> Router {
    Router::new()
        .route("/", get(liveness))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Start the liveness server.
///
/// Binds the listener, then spawns the serve task and returns its handle.
pub async fn start_server(config: ApiConfig) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let router = build_router();
    let addr = config
        .socket_addr()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Liveness endpoint listening on http://{}", addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("Liveness server error: {}", e);
        }
    });

    Ok(handle)
}
