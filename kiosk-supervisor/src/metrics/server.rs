//! The scrape endpoint (spec §4.5 "Scrape endpoint", §6).
//!
//! Modeled on the teacher's `rust-srec/src/api/server.rs` +
//! `api/routes/health.rs`: an `axum::Router<AppState>` serving a handful of
//! routes, built once in `main`/`supervisor` and run on its own task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{Error, Result};

use super::registry::Registry;

/// Shared state for the scrape router (spec §4.5 "reading the registry
/// takes a snapshot under a short-held shared lock" — realized here via
/// the registry's own per-series atomics, so the handler never blocks the
/// supervisor).
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub start_time: Instant,
}

/// Build the router: `/metrics` (spec §4.5/§6) plus an ambient `/healthz`
/// liveness route the teacher always pairs with a metrics endpoint.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(scrape))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn scrape(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.registry.render();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    (
        StatusCode::OK,
        format!("ok uptime_seconds={uptime}\n"),
    )
}

/// Bind and serve the scrape router until `shutdown` resolves (spec §5
/// "Scrape server ... one task (or task pool)").
pub async fn serve(
    bind_host: &str,
    bind_port: u16,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr: SocketAddr = format!("{bind_host}:{bind_port}")
        .parse()
        .map_err(|err| Error::config(format!("invalid scrape bind address: {err}")))?;

    let listener = TcpListener::bind(addr).await.map_err(Error::Io)?;
    info!(%addr, "scrape endpoint listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(Error::Io)
}
