//! HTTP server and the per-scrape request pipeline.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::sync::watch;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info, warn};

use crate::collector::{Registry, TemperatureCollector};
use crate::config::{ExporterConfig, SnmpConfig};
use crate::resolver::TargetTable;
use crate::walker::WalkError;

/// Application state shared across handlers. Immutable after startup: scrapes
/// share nothing else.
#[derive(Clone)]
struct AppState {
    config: Arc<ExporterConfig>,
    table: Arc<TargetTable>,
}

/// Create the HTTP router.
pub fn create_router(config: Arc<ExporterConfig>) -> Router {
    let table = Arc::new(TargetTable::new(config.targets.clone()));
    let ceiling = scrape_ceiling(&config.snmp);
    let state = AppState { config, table };

    Router::new()
        .route("/", get(scrape_handler))
        .route("/health", get(health_handler))
        .layer(TimeoutLayer::new(ceiling))
        .with_state(state)
}

/// Explicit latency ceiling for one scrape: a single round trip exhausting
/// its whole retry budget, plus headroom.
fn scrape_ceiling(snmp: &SnmpConfig) -> Duration {
    Duration::from_secs(snmp.timeout_secs * u64::from(snmp.retries) + 5)
}

/// Handler for `GET /?target=<key>`.
///
/// Validates the request, resolves the target, then runs walk and parse
/// through a registry built fresh for this request. Every failure is local
/// to this scrape.
async fn scrape_handler(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let values: Vec<&str> = params
        .iter()
        .filter(|(k, _)| k == "target")
        .map(|(_, v)| v.as_str())
        .collect();

    if values.len() != 1 || values[0].is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            "'target' parameter must be specified once\n",
        )
            .into_response();
    }
    let key = values[0];

    let Some(target) = state.table.resolve(key) else {
        warn!(target = %key, "No such target");
        return (StatusCode::NOT_FOUND, "Not found\n").into_response();
    };

    let mut registry = Registry::new();
    registry.register(TemperatureCollector::new(
        target,
        &state.config.community,
        &state.config.snmp,
    ));

    match registry.gather().await {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e @ WalkError::Timeout { .. }) => {
            error!(target = %key, error = %e, "Scrape failed");
            (StatusCode::GATEWAY_TIMEOUT, "Agent timed out\n").into_response()
        }
        Err(e) => {
            error!(target = %key, error = %e, "Scrape failed");
            (StatusCode::BAD_GATEWAY, "Agent unreachable\n").into_response()
        }
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// HTTP server wrapper.
pub struct HttpServer {
    config: Arc<ExporterConfig>,
    listen_addr: SocketAddr,
}

impl HttpServer {
    pub fn new(config: Arc<ExporterConfig>, listen_addr: SocketAddr) -> Self {
        Self {
            config,
            listen_addr,
        }
    }

    /// Run the HTTP server until the shutdown signal is received. After the
    /// signal, no new scrapes are accepted; in-flight ones are allowed to
    /// finish (bounded by the caller's grace period).
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let router = create_router(self.config);

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        info!(addr = %self.listen_addr, "HTTP server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
