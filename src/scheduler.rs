//! Interprets an `Execution` list: sequential, worker-pool, and loop
//! dispatch over a heterogeneous step tree.
//!
//! Grounded on `original_source/handler/process.go`'s `processSteps` /
//! `processStep` (the channel-of-indices worker pool, and the
//! `concurrency <= 0` / `== 1` / `> 1` trichotomy) and `handler/step.go`'s
//! `loop` (sequential-vs-fan-out iteration). The channel there is backed
//! by goroutines and `errgroup`; here it's `tokio::sync::mpsc` behind a
//! shared `Mutex` (multiple workers, one receiver) plus a `JoinSet`, with
//! first-error-wins implemented via a child `CancellationToken` instead
//! of `errgroup`'s derived context.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::anyhow;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

use crate::call;
use crate::compute;
use crate::context::RequestContext;
use crate::plan::location::child_location;
use crate::plan::{Execution, Loop, Step};

type BoxFut = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Runs `execution` with a parent-specified worker count, per spec §4.4:
/// `concurrency == 1` is strict sequential, `concurrency <= 0` means
/// "unlimited" (one worker per child), anything else is a bounded pool.
/// `step_idx_offset` lets a `Call`'s pre- and post-execution phases share
/// one contiguous index space for location numbering.
pub async fn process_steps(
    concurrency: i32,
    step_idx_offset: usize,
    execution: &Execution,
    location: &str,
    ctx: &RequestContext,
) -> anyhow::Result<()> {
    if execution.is_empty() {
        return Ok(());
    }

    if concurrency == 1 {
        for (i, step) in execution.iter().enumerate() {
            process_step(step_idx_offset + i, step, location, ctx).await?;
        }
        return Ok(());
    }

    let workers = if concurrency <= 0 { execution.len() } else { concurrency as usize };
    let execution = Arc::new(execution.clone());
    let location = location.to_string();
    let ctx = ctx.clone();

    run_pool(workers, execution.len(), &ctx.cancel.clone(), move |idx| {
        let execution = execution.clone();
        let location = location.clone();
        let ctx = ctx.clone();
        Box::pin(async move { process_step(step_idx_offset + idx, &execution[idx], &location, &ctx).await }) as BoxFut
    })
    .await
}

async fn process_step(step_idx: usize, step: &Step, location: &str, ctx: &RequestContext) -> anyhow::Result<()> {
    let result = match step {
        Step::Call(c) => call::execute(c, &child_location(location, step_idx), ctx).await,
        Step::Compute(c) => {
            compute::run(c, &ctx.fill, &ctx.cancel).await;
            Ok(())
        }
        Step::Parallel(p) => {
            process_steps(p.concurrency, 0, &p.execution, &child_location(location, step_idx), ctx).await
        }
        Step::Loop(l) => run_loop(l, &child_location(location, step_idx), ctx).await,
    };
    result.map_err(|e| anyhow!("failed at step {step_idx}: {e}"))
}

/// Runs a `Loop`: `times` iterations of `execution` followed by `compute`,
/// either strictly sequential (`concurrency <= 1`) or fanned out over
/// `min(concurrency, times)` workers each drawing iteration tokens from a
/// shared queue. Per spec §4.4, loop children do not extend `location` —
/// every iteration reuses the loop's own location unchanged.
async fn run_loop(loop_step: &Loop, location: &str, ctx: &RequestContext) -> anyhow::Result<()> {
    if loop_step.times <= 0 {
        return Ok(());
    }
    let times = loop_step.times as usize;

    if loop_step.concurrency <= 1 {
        for _ in 0..times {
            run_loop_iteration(loop_step, location, ctx).await?;
        }
        return Ok(());
    }

    let workers = (loop_step.concurrency as usize).min(times);
    let loop_step = Arc::new(loop_step.clone());
    let location = location.to_string();
    let ctx = ctx.clone();

    run_pool(workers, times, &ctx.cancel.clone(), move |_token| {
        let loop_step = loop_step.clone();
        let location = location.clone();
        let ctx = ctx.clone();
        Box::pin(async move { run_loop_iteration(&loop_step, &location, &ctx).await }) as BoxFut
    })
    .await
}

async fn run_loop_iteration(loop_step: &Loop, location: &str, ctx: &RequestContext) -> anyhow::Result<()> {
    process_steps(1, 0, &loop_step.execution, location, ctx).await?;
    compute::run(&loop_step.compute, &ctx.fill, &ctx.cancel).await;
    Ok(())
}

/// A bounded worker pool draining `n_tokens` indices `0..n_tokens` through
/// `task`, first-error-wins. `cancel` is the scope's parent token; workers
/// share a child of it so an error (or the parent firing) stops every
/// peer promptly without affecting sibling scopes.
async fn run_pool<F>(workers: usize, n_tokens: usize, cancel: &CancellationToken, task: F) -> anyhow::Result<()>
where
    F: Fn(usize) -> BoxFut + Send + Sync + 'static,
{
    if n_tokens == 0 {
        return Ok(());
    }
    let workers = workers.max(1);
    let group_cancel = cancel.child_token();
    let error: Arc<StdMutex<Option<anyhow::Error>>> = Arc::new(StdMutex::new(None));
    let task = Arc::new(task);

    let (tx, rx) = tokio::sync::mpsc::channel::<usize>(1);
    let rx = Arc::new(AsyncMutex::new(rx));

    let mut set = tokio::task::JoinSet::new();
    for _ in 0..workers {
        let rx = rx.clone();
        let group_cancel = group_cancel.clone();
        let error = error.clone();
        let task = task.clone();
        set.spawn(async move {
            loop {
                let next = {
                    let mut guard = rx.lock().await;
                    tokio::select! {
                        biased;
                        _ = group_cancel.cancelled() => None,
                        v = guard.recv() => v,
                    }
                };
                let idx = match next {
                    Some(i) => i,
                    None => return,
                };
                if let Err(e) = task(idx).await {
                    let mut slot = error.lock().expect("scheduler error mutex poisoned");
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                    group_cancel.cancel();
                    return;
                }
            }
        });
    }

    for idx in 0..n_tokens {
        tokio::select! {
            biased;
            _ = group_cancel.cancelled() => break,
            result = tx.send(idx) => {
                if result.is_err() {
                    break;
                }
            }
        }
    }
    drop(tx);

    while set.join_next().await.is_some() {}

    match error.lock().expect("scheduler error mutex poisoned").take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::EncodedPlan;
    use crate::plan::{Call, Compute, Http, Plan};
    use std::time::Duration;

    fn test_ctx() -> RequestContext {
        RequestContext::new(
            Plan::default(),
            EncodedPlan { content: String::new(), encoding: String::new() },
            "root".to_string(),
            reqwest::Client::new(),
            &CancellationToken::new(),
        )
    }

    fn compute_step(ms: u64) -> Step {
        Step::Compute(Compute { min: Duration::from_millis(ms), max: Duration::from_millis(ms), cpu: 0.0, memory_delta_kb: 0 })
    }

    #[tokio::test]
    async fn sequential_runs_children_in_order() {
        let ctx = test_ctx();
        let execution = vec![compute_step(5), compute_step(5), compute_step(5)];
        let start = std::time::Instant::now();
        process_steps(1, 0, &execution, "", &ctx).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(14));
    }

    #[tokio::test]
    async fn unlimited_concurrency_runs_all_children_together() {
        let ctx = test_ctx();
        let execution: Vec<Step> = (0..4).map(|_| compute_step(40)).collect();
        let start = std::time::Instant::now();
        process_steps(0, 0, &execution, "", &ctx).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(150));
    }

    #[tokio::test]
    async fn bounded_pool_batches_work() {
        let ctx = test_ctx();
        let execution: Vec<Step> = (0..4).map(|_| compute_step(40)).collect();
        let start = std::time::Instant::now();
        process_steps(2, 0, &execution, "", &ctx).await.unwrap();
        // 4 children over 2 workers: ~2 batches of ~40ms
        assert!(start.elapsed() >= Duration::from_millis(70));
        assert!(start.elapsed() < Duration::from_millis(250));
    }

    #[tokio::test]
    async fn loop_sequential_runs_times_iterations() {
        let ctx = test_ctx();
        let loop_step = Loop {
            times: 3,
            concurrency: 1,
            compute: Compute { min: Duration::from_millis(10), max: Duration::from_millis(10), cpu: 0.0, memory_delta_kb: 0 },
            execution: vec![],
        };
        let start = std::time::Instant::now();
        run_loop(&loop_step, "0", &ctx).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(28));
    }

    #[tokio::test]
    async fn loop_fanout_bounds_iterations_to_times() {
        let ctx = test_ctx();
        let loop_step = Loop {
            times: 2,
            concurrency: 5,
            compute: Compute::default(),
            execution: vec![Step::Call(Call { http: Http { url: "http://127.0.0.1:1".into(), ..Http::default() }, async_: true, ..Call::default() })],
        };
        run_loop(&loop_step, "0", &ctx).await.unwrap();
    }

    #[tokio::test]
    async fn first_error_is_surfaced_after_peers_finish() {
        // Peers that are already mid-flight are not forcibly aborted (only
        // queue draining stops early) — group_cancel just stops new work
        // from being handed out, matching errgroup.Wait() semantics.
        let ctx = test_ctx();
        let execution = vec![
            Step::Call(Call { http: Http { method: "BAD METHOD".into(), url: "x".into(), ..Http::default() }, ..Call::default() }),
            compute_step(60),
        ];
        let result = process_steps(2, 0, &execution, "", &ctx).await;
        assert!(result.is_err());
    }
}
