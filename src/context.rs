//! Per-request state threaded through the scheduler and call executor.
//!
//! Adapted from the teacher's `context::Context` (there: interpolation
//! variables for a test-runner request). Here the same "one value bag
//! passed down the recursion, owned by the handler" shape holds instead
//! the things spec §3's Lifecycles section calls out as per-handler:
//! the `Fill` buffer, the async wait group, and the cancellation token
//! that makes every suspension point cooperative.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::fill::Fill;
use crate::headers::EncodedPlan;
use crate::outstanding::AsyncWaitGroup;
use crate::plan::Plan;

/// State shared across every hop of a running mesh: the HTTP client used
/// for outgoing calls, process-wide counters, and the base cancellation
/// token tied to the server's lifetime.
#[derive(Clone)]
pub struct AppState {
    pub client: reqwest::Client,
    pub counters: Arc<crate::outstanding::Counters>,
    pub base_cancel: CancellationToken,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            counters: Arc::new(crate::outstanding::Counters::new()),
            base_cancel: CancellationToken::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Created fresh for every inbound request; destroyed when the handler
/// returns. Cloning is cheap (everything inside is `Arc`'d or itself a
/// cheap handle) since the scheduler fans this out to every concurrent
/// child step.
#[derive(Clone)]
pub struct RequestContext {
    pub plan: Arc<Plan>,
    pub encoded: Arc<EncodedPlan>,
    pub fill: Arc<Fill>,
    pub async_wg: AsyncWaitGroup,
    pub cancel: CancellationToken,
    pub trace_id: String,
    pub client: reqwest::Client,
}

impl RequestContext {
    pub fn new(
        plan: Plan,
        encoded: EncodedPlan,
        trace_id: String,
        client: reqwest::Client,
        base_cancel: &CancellationToken,
    ) -> Self {
        Self {
            plan: Arc::new(plan),
            encoded: Arc::new(encoded),
            fill: Arc::new(Fill::new()),
            async_wg: AsyncWaitGroup::new(),
            cancel: base_cancel.child_token(),
            trace_id,
            client,
        }
    }
}

/// Cancels a [`CancellationToken`] if dropped while still armed.
///
/// axum/hyper drop an in-flight handler's future when the underlying
/// connection goes away before a response is produced (a reset socket,
/// a client hanging up mid-request) — the task driving that connection
/// simply stops polling it. A value of this type held across the
/// pre-response portion of a handler turns that drop into the same
/// cooperative-cancellation signal `ctx.cancel` already carries for base
/// context / process shutdown, per spec §4.6's context rule that request
/// cancellation and base-context cancellation both unblock every wait in
/// the engine — including `compute/cpu.rs`'s OS-thread CPU-burn workers,
/// which only ever check `cancel.is_cancelled()`.
///
/// Call [`disarm`](Self::disarm) once a response has actually been
/// produced, so returning normally doesn't also cancel the (possibly
/// still-running) post-execution phase and async drain that follow it.
pub struct DisconnectGuard {
    cancel: CancellationToken,
    armed: bool,
}

impl DisconnectGuard {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel, armed: true }
    }

    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if self.armed {
            self.cancel.cancel();
        }
    }
}
