//! HTTP server shell: a single fallback route serving every path and
//! method, graceful shutdown on Ctrl-C with a 1s grace period.
//!
//! Thin by design (spec §2 calls out C9 as "thin — see §6"), grounded on
//! `original_source/server/server.go`'s listen/serve loop and
//! `original_source/cmd/signal.go`'s signal wiring, re-expressed through
//! axum + tokio's signal handling instead of the stdlib `net/http`
//! server the original used.

use std::net::SocketAddr;
use std::time::Duration;

use axum::routing::any;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::context::AppState;
use crate::handler;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Builds the router for a given [`AppState`] — a single fallback route
/// handling every method and path, per spec §6's HTTP surface. The
/// `TraceLayer` adds per-connection request/response spans alongside the
/// handler's own access-log lines; the two operate at different levels
/// (transport vs. plan-location semantics) and aren't redundant.
pub fn app(state: AppState) -> Router {
    Router::new().fallback(any(handler::handle)).layer(TraceLayer::new_for_http()).with_state(state)
}

/// Binds `listen_addr` and serves `app` until Ctrl-C, with a graceful
/// shutdown grace period afterwards.
pub async fn serve(listen_addr: &str) -> anyhow::Result<()> {
    let state = AppState::new();
    let base_cancel = state.base_cancel.clone();
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!("listening on {}", listener.local_addr()?);
    run(listener, app(state), base_cancel).await
}

/// Runs a prebuilt app on an already-bound listener until Ctrl-C.
pub async fn run(listener: tokio::net::TcpListener, app: Router, base_cancel: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(base_cancel))
        .await?;
    Ok(())
}

async fn shutdown_signal(base_cancel: tokio_util::sync::CancellationToken) {
    tokio::signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
    info!("shutdown signal received, cancelling in-flight work and waiting {:?}", SHUTDOWN_GRACE);
    base_cancel.cancel();
    tokio::time::sleep(SHUTDOWN_GRACE).await;
}
