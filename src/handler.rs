//! Orchestrates one plan-node visit end-to-end — the nine-step lifecycle
//! from spec §4.6. Grounded on `original_source/handler/handler.go`'s
//! `Handle` (the body read → header decode → locate → compute → execute
//! → respond sequence) and `handler/log.go` for the access-log line
//! formats; async dispatch and post-execution are additions absent from
//! that revision of the source (it predates `Call.Async`/`PostExecution`)
//! and instead follow `plan/call.go`'s phase list and spec §4.6 directly.
//!
//! Steps 8 and 9 (post-execution, then blocking on the async wait group)
//! run *after* the response is handed back to axum. The source can do
//! this inline in the same goroutine because `net/http`'s
//! `ResponseWriter.Write` flushes bytes to the client immediately; axum
//! only sends a response once its handler future resolves, so doing the
//! same inline here would make post-execution and async calls delay the
//! client, contradicting spec §9's "avoid structured concurrency that
//! would force the handler to await the task before responding" and the
//! "root responds immediately; /m is observed strictly after the client
//! receives its response" testable property. Steps 8-9 are spawned as a
//! detached tail task instead; `Counters::exit` moves with it so the
//! client's drain-and-exit poll loop still sees the request as
//! outstanding until that tail finishes.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Instant;

use axum::body::{to_bytes, Bytes};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

use crate::compute;
use crate::context::{AppState, DisconnectGuard, RequestContext};
use crate::errors::AppError;
use crate::headers;
use crate::plan::location;
use crate::rng;
use crate::scheduler;

type Tail = Pin<Box<dyn Future<Output = ()> + Send>>;

/// No synthetic request body this engine generates or forwards is large;
/// this just keeps a single misbehaving peer from exhausting memory with
/// an unbounded body.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

pub async fn handle(State(state): State<AppState>, ConnectInfo(remote): ConnectInfo<SocketAddr>, req: Request) -> Response {
    state.counters.enter();

    let (parts, body) = req.into_parts();
    let method = parts.method;
    let uri = parts.uri;
    let header_map = parts.headers;

    // Step 1: read the request body fully. A read failure (the peer
    // resetting the connection mid-body, a body over the size limit) is
    // a 400 routed through the app's own error response, not a bare
    // axum/hyper rejection.
    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            state.counters.exit();
            return AppError::BadRequest(err.to_string()).into_response();
        }
    };

    let (response, tail) = handle_inner(&state, remote, &method, &uri, &header_map, &body).await;
    let counters = state.counters.clone();
    tokio::spawn(async move {
        tail.await;
        counters.exit();
    });
    response
}

async fn handle_inner(
    state: &AppState,
    remote: SocketAddr,
    method: &Method,
    uri: &Uri,
    header_map: &HeaderMap,
    body: &Bytes,
) -> (Response, Tail) {
    // Step 2: derive this request's trace id before anything else can fail,
    // so even error responses are attributable to one.
    let incoming_trace = header_map
        .get(headers::HEADER_REQUEST_TRACE)
        .and_then(|v| v.to_str().ok());
    let trace_id = rng::next_trace_id(incoming_trace);

    // Step 3: parse plan + location from headers.
    let inbound = match headers::read_plan_headers(header_map) {
        Ok(inbound) => inbound,
        Err(err) => return (AppError::BadPlan(err.to_string()).into_response(), Box::pin(async {})),
    };

    log_request_in(&inbound.location, remote, method, uri, body.len());

    // Step 4: locate the Call at this location.
    let call = match location::locate(&inbound.plan, &inbound.location) {
        Ok(call) => call,
        Err(err) => return (AppError::BadLocation(err.to_string()).into_response(), Box::pin(async {})),
    };

    let ctx = RequestContext::new(
        inbound.plan,
        inbound.encoded,
        trace_id,
        state.client.clone(),
        &state.base_cancel,
    );

    // Armed for steps 5-7: if the client disconnects before a response is
    // produced, axum drops this future mid-poll, dropping `disconnect_guard`
    // with it and cancelling `ctx.cancel` — the same signal a base-context
    // or request-context cancellation already delivers to every suspension
    // point below. Disarmed (not dropped-while-armed) on every path that
    // actually returns a response, so a normal completion doesn't cancel
    // the post-execution/async-drain tail that follows it.
    let disconnect_guard = DisconnectGuard::new(ctx.cancel.clone());

    // Step 5: synchronous compute phase.
    compute::run(&call.compute, &ctx.fill, &ctx.cancel).await;

    // Step 6: pre-execution children. An error here is reported as a 500
    // and skips post-execution entirely, but the async wait group still
    // drains (resolved open question, spec §9).
    let started = Instant::now();
    if let Err(err) = scheduler::process_steps(1, 0, &call.execution, &inbound.location, &ctx).await {
        warn!(location = %inbound.location, error = %err, "pre-execution failed");
        let response = AppError::StepFailure(err).into_response();
        disconnect_guard.disarm();
        let ctx = ctx.clone();
        return (response, Box::pin(async move { ctx.async_wg.wait(&ctx.cancel).await }));
    }

    // Step 7: write the response.
    let status = if call.http.status_code == 0 { 200 } else { call.http.status_code };
    let response_body = if let Some(body) = &call.http.response_body {
        body.clone()
    } else if call.http.gen_response_body > 0 {
        rng::random_string(call.http.gen_response_body)
    } else {
        String::new()
    };
    log_response_out(&inbound.location, remote, method, uri, body.len(), status, response_body.len(), started.elapsed());
    let response = build_response(status, response_body);
    disconnect_guard.disarm();

    // Steps 8-9: post-execution and the async drain happen after the
    // response has been handed off, so neither delays the client.
    let location = inbound.location.clone();
    let step_idx_offset = call.execution.len();
    let post_execution = call.post_execution.clone();
    let remote_tail = remote;
    let method_tail = method.clone();
    let uri_tail = uri.clone();
    let ctx_tail = ctx.clone();
    let tail: Tail = Box::pin(async move {
        if !post_execution.is_empty() {
            let post_started = Instant::now();
            if let Err(err) =
                scheduler::process_steps(1, step_idx_offset, &post_execution, &location, &ctx_tail).await
            {
                warn!(location = %location, error = %err, "post-execution failed (response already sent)");
            }
            log_post_response_out(&location, remote_tail, &method_tail, &uri_tail, post_started.elapsed());
        }
        ctx_tail.async_wg.wait(&ctx_tail.cancel).await;
    });

    (response, tail)
}

fn build_response(status: u16, body: String) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
    (status, body).into_response()
}

fn log_request_in(location: &str, remote: SocketAddr, method: &Method, uri: &Uri, body_len: usize) {
    info!("{:<12} > {} {} {} {}", location, remote, method, uri, body_len);
}

#[allow(clippy::too_many_arguments)]
fn log_response_out(
    location: &str,
    remote: SocketAddr,
    method: &Method,
    uri: &Uri,
    req_body_len: usize,
    status: u16,
    resp_body_len: usize,
    elapsed: std::time::Duration,
) {
    info!(
        "{:<12} < {} {} {} {} -> {} {} in {:?}",
        location, remote, method, uri, req_body_len, status, resp_body_len, elapsed
    );
}

fn log_post_response_out(location: &str, remote: SocketAddr, method: &Method, uri: &Uri, elapsed: std::time::Duration) {
    info!("{:<12} p {} {} {} in {:?}", location, remote, method, uri, elapsed);
}
