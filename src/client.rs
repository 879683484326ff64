//! Client mode: binds an ephemeral local server instance (itself a full
//! mesh node), fires one entry request at it carrying the loaded plan,
//! then blocks until the process has no outstanding requests.
//!
//! Grounded on `original_source/cmd/client/main.go`'s flow (read plan,
//! bind, POST, wait-then-exit); the original posts directly with the
//! stdlib `net/http` client against its own locally bound listener — this
//! keeps that shape, swapping in `reqwest` and this crate's header codec.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::info;

use crate::context::AppState;
use crate::{headers, plan, server};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub async fn run(plan_path: &str, port: u16) -> anyhow::Result<()> {
    let plan = plan::codec::load_file(plan_path)?;

    let state = AppState::new();
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;
    info!("client bound local node at {}", local_addr);

    let counters = state.counters.clone();
    let base_cancel = state.base_cancel.clone();
    let app = server::app(state);
    let server_task = tokio::spawn(async move { server::run(listener, app, base_cancel).await });

    send_entry_request(&plan, local_addr).await?;

    while counters.outstanding() > 0 {
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    info!("all outstanding requests drained, exiting");

    server_task.abort();
    Ok(())
}

async fn send_entry_request(plan: &plan::Plan, local_addr: SocketAddr) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let encoded = headers::encode_plan(plan)?;
    let builder = client.post(format!("http://{local_addr}/run-plan"));
    let builder = headers::write_plan_headers(builder, &encoded, "", "");
    let response = builder.send().await?;
    info!(status = %response.status(), "entry request completed");
    Ok(())
}
