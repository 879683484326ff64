//! Process-wide request counters, and a per-handler wait group for
//! asynchronous child calls.
//!
//! Ported from `original_source/sync/waitgroup.go` (the atomic counter
//! riding alongside a `sync.WaitGroup`) and the counter/stall-log
//! behavior described across spec §4.6/§4.8.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::info;

/// Process-wide counters. One instance lives for the life of the server.
#[derive(Default)]
pub struct Counters {
    outstanding: AtomicI64,
    handled: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        self.handled.fetch_add(1, Ordering::SeqCst);
    }

    pub fn outstanding(&self) -> i64 {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::SeqCst)
    }
}

const STALL_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Tracks async child calls launched by a single handler invocation.
/// `wait` blocks until the count returns to zero (or `cancel` fires),
/// logging a stall line every [`STALL_LOG_INTERVAL`] while it waits.
#[derive(Clone)]
pub struct AsyncWaitGroup {
    inner: Arc<Inner>,
}

struct Inner {
    current: AtomicI64,
    notify: Notify,
}

impl Default for AsyncWaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncWaitGroup {
    pub fn new() -> Self {
        Self { inner: Arc::new(Inner { current: AtomicI64::new(0), notify: Notify::new() }) }
    }

    pub fn add(&self, delta: i64) {
        self.inner.current.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn done(&self) {
        if self.inner.current.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn current(&self) -> i64 {
        self.inner.current.load(Ordering::SeqCst)
    }

    /// Blocks until `current() == 0` or `cancel` fires, emitting the
    /// spec's `"! Waiting on N async calls for D and counting"` log line
    /// once every [`STALL_LOG_INTERVAL`] while blocked.
    pub async fn wait(&self, cancel: &tokio_util::sync::CancellationToken) {
        let start = std::time::Instant::now();
        loop {
            if self.current() <= 0 {
                return;
            }
            tokio::select! {
                _ = self.inner.notify.notified() => {}
                _ = tokio::time::sleep(STALL_LOG_INTERVAL) => {
                    if self.current() > 0 {
                        info!(
                            "! Waiting on {} async calls for {:?} and counting",
                            self.current(),
                            start.elapsed()
                        );
                    }
                }
                _ = cancel.cancelled() => return,
            }
            if self.current() <= 0 {
                return;
            }
        }
    }
}
