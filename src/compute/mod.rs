//! Executes a [`Compute`] step: resolve a duration, apply a memory delta,
//! and optionally burn CPU, all while honoring cancellation.
//!
//! Grounded on `original_source/plan/compute.go`'s `Do`/`do`/`compute`
//! trio. `cpu` holds the busy-wait worker loop; this module resolves the
//! duration, applies the memory delta up front (per spec §4.2 step 2),
//! and waits out whatever's left once CPU workers are launched.

pub mod cpu;

use std::time::{Duration, Instant};

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::fill::Fill;
use crate::plan::Compute;

/// Runs one `Compute` step to completion (or until `cancel` fires).
/// An invalid compute (`Compute::is_valid` false) is a silent no-op in
/// every respect — no sleep, no cpu burn, no memory delta. A *valid but
/// zero-duration* compute (`min == max == 0`) still applies its memory
/// delta: only the sleep/cpu-burn stage is skipped, per spec §4.2's
/// "memory side effects are applied even if duration == 0" invariant.
pub async fn run(compute: &Compute, fill: &Fill, cancel: &CancellationToken) {
    if !compute.is_valid() {
        return;
    }

    let duration = resolve_duration(compute);
    let start = Instant::now();

    if compute.memory_delta_kb != 0 {
        fill.add(compute.memory_delta_kb * 1024);
    }

    if compute.is_zero() {
        return;
    }

    let remaining = duration.saturating_sub(start.elapsed());
    wait(compute.cpu, remaining, cancel).await;
}

fn resolve_duration(compute: &Compute) -> Duration {
    if compute.min >= compute.max {
        return compute.min;
    }
    let span_nanos = (compute.max - compute.min).as_nanos() as u64;
    let offset = rand::thread_rng().gen_range(0..span_nanos);
    compute.min + Duration::from_nanos(offset)
}

async fn wait(cpu: f64, duration: Duration, cancel: &CancellationToken) {
    let num_cpus = num_cpus::get();
    let handles = if cpu > 0.0 {
        cpu::burn(cpu, duration, num_cpus, cancel.clone())
    } else {
        Vec::new()
    };

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = cancel.cancelled() => {}
    }

    // CPU workers observe the same deadline/cancellation independently;
    // joining here just bounds how long `run` waits for their threads to
    // actually exit before returning.
    for handle in handles {
        let _ = tokio::task::spawn_blocking(move || handle.join()).await;
    }
}
