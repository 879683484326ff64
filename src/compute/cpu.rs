//! Synthetic multi-core CPU load. Ported from the worker loop in
//! `original_source/plan/compute.go`'s `compute` method: one OS thread per
//! whole or fractional core, each alternating a tight busy-wait with a
//! sleep inside 1ms work units so the measured load approximates the
//! requested ratio without spinning forever.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

const WORK_UNIT: Duration = Duration::from_millis(1);

/// Spawns one OS thread per core touched by `cpu` (capped at `num_cpus`),
/// each burning `ratio = clamp(cpu - core_index, 0, 1)` of its work units,
/// until `duration` elapses or `cancel` fires. Each thread is a dedicated
/// OS thread for its whole lifetime, which is the Rust equivalent of the
/// original's `runtime.LockOSThread()` pinning: nothing else is scheduled
/// onto it to confound the measured load.
pub fn burn(cpu: f64, duration: Duration, num_cpus: usize, cancel: CancellationToken) -> Vec<std::thread::JoinHandle<()>> {
    let mut handles = Vec::new();
    if cpu <= 0.0 || duration.is_zero() {
        return handles;
    }

    for core in 0..num_cpus {
        let ratio = (cpu - core as f64).clamp(0.0, 1.0);
        if ratio <= 0.0 {
            break;
        }
        let cancel = cancel.clone();
        handles.push(std::thread::spawn(move || burn_one_core(ratio, duration, cancel)));
    }

    handles
}

fn burn_one_core(ratio: f64, duration: Duration, cancel: CancellationToken) {
    let start = Instant::now();
    loop {
        let unit_start = Instant::now();
        let work_unit = if duration.saturating_sub(start.elapsed()) < WORK_UNIT {
            duration.saturating_sub(start.elapsed())
        } else {
            WORK_UNIT
        };
        let busy_for = work_unit.mul_f64(ratio);
        let sleep_for = work_unit.saturating_sub(busy_for);

        loop {
            if start.elapsed() >= duration || cancel.is_cancelled() {
                return;
            }
            if unit_start.elapsed() >= busy_for {
                break;
            }
        }
        if !sleep_for.is_zero() {
            std::thread::sleep(sleep_for);
        }
        if start.elapsed() >= duration || cancel.is_cancelled() {
            return;
        }
    }
}
