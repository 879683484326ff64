//! Concurrency/timing properties of the scheduler as observed through a
//! real HTTP round trip, rather than by calling `process_steps` directly
//! (the in-module unit tests in `src/scheduler.rs` already cover that).
//! A `Parallel` node here fans out to real self-addressed `Call` children
//! whose receiving ends each carry a `compute` delay, so wall-clock is
//! actually gated by the network + scheduler path end to end.

use std::time::Duration;

use callmesh::context::AppState;
use callmesh::headers;
use callmesh::plan::{Call, Compute, Http, Parallel, Plan, Step};
use callmesh::server;

struct Node {
    addr: std::net::SocketAddr,
    task: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl Node {
    async fn spawn() -> Self {
        let state = AppState::new();
        let base_cancel = state.base_cancel.clone();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = server::app(state);
        let task = tokio::spawn(async move { server::run(listener, app, base_cancel).await });
        Node { addr, task }
    }

    async fn shutdown(self) {
        self.task.abort();
    }
}

/// A leaf `Call` that loops back to `addr` addressed at `location`, each
/// receiving end delaying by `delay` before replying.
fn self_addressed_call(addr: std::net::SocketAddr, delay: Duration) -> Call {
    Call {
        http: Http { method: "POST".into(), url: format!("http://{addr}/run-plan"), status_code: 200, ..Http::default() },
        compute: Compute { min: delay, max: delay, cpu: 0.0, memory_delta_kb: 0 },
        ..Call::default()
    }
}

#[tokio::test]
async fn a_parallel_fan_out_runs_children_concurrently_not_sequentially() {
    let node = Node::spawn().await;
    let client = reqwest::Client::new();

    // 4 children, each delaying 50ms on the receiving end, concurrency 0
    // ("unlimited" — one worker per child): total wall time should look
    // like one delay, not four stacked up.
    let plan = Plan {
        execution: vec![Step::Parallel(Parallel {
            concurrency: 0,
            execution: (0..4).map(|_| Step::Call(self_addressed_call(node.addr, Duration::from_millis(50)))).collect(),
        })],
    };
    let encoded = headers::encode_plan(&plan).unwrap();
    let builder = client.post(format!("http://{}/run-plan", node.addr));
    let builder = headers::write_plan_headers(builder, &encoded, "", "t-par");

    let started = std::time::Instant::now();
    let response = builder.send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert!(started.elapsed() < Duration::from_millis(180), "elapsed {:?} looked sequential", started.elapsed());

    node.shutdown().await;
}

#[tokio::test]
async fn a_bounded_parallel_pool_batches_work_across_two_workers() {
    let node = Node::spawn().await;
    let client = reqwest::Client::new();

    // 4 children over 2 workers, each delaying 50ms: ~2 batches.
    let plan = Plan {
        execution: vec![Step::Parallel(Parallel {
            concurrency: 2,
            execution: (0..4).map(|_| Step::Call(self_addressed_call(node.addr, Duration::from_millis(50)))).collect(),
        })],
    };
    let encoded = headers::encode_plan(&plan).unwrap();
    let builder = client.post(format!("http://{}/run-plan", node.addr));
    let builder = headers::write_plan_headers(builder, &encoded, "", "t-bounded");

    let started = std::time::Instant::now();
    let response = builder.send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(90), "elapsed {elapsed:?} looked fully parallel");
    assert!(elapsed < Duration::from_millis(280), "elapsed {elapsed:?} looked sequential");

    node.shutdown().await;
}

#[tokio::test]
async fn strict_sequential_children_run_one_after_another() {
    let node = Node::spawn().await;
    let client = reqwest::Client::new();

    // concurrency == 1 is strict sequential per spec §4.4: 3 children at
    // 30ms each should take at least ~90ms.
    let plan = Plan {
        execution: vec![Step::Parallel(Parallel {
            concurrency: 1,
            execution: (0..3).map(|_| Step::Call(self_addressed_call(node.addr, Duration::from_millis(30)))).collect(),
        })],
    };
    let encoded = headers::encode_plan(&plan).unwrap();
    let builder = client.post(format!("http://{}/run-plan", node.addr));
    let builder = headers::write_plan_headers(builder, &encoded, "", "t-seq");

    let started = std::time::Instant::now();
    let response = builder.send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert!(started.elapsed() >= Duration::from_millis(85));

    node.shutdown().await;
}
