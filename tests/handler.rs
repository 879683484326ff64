//! End-to-end: a real axum server bound to a loopback socket, driven
//! through an actual HTTP client, the way
//! `examples/surrealdb-surrealdb/tests/http_integration.rs` drives its
//! server. Exercises the nine-step handler lifecycle (locate, compute,
//! pre-execution, response, post-execution, drain) without mocking
//! anything below the socket.

use std::time::Duration;

use callmesh::context::AppState;
use callmesh::headers;
use callmesh::plan::{Call, Compute, Http, Loop, Plan, Step};
use callmesh::server;

mod support {
    use super::*;
    use std::sync::Arc;

    pub struct Node {
        pub addr: std::net::SocketAddr,
        pub counters: Arc<callmesh::outstanding::Counters>,
        task: tokio::task::JoinHandle<anyhow::Result<()>>,
    }

    impl Node {
        pub async fn spawn() -> Self {
            let state = AppState::new();
            let counters = state.counters.clone();
            let base_cancel = state.base_cancel.clone();
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let app = server::app(state);
            let task = tokio::spawn(async move { server::run(listener, app, base_cancel).await });
            Node { addr, counters, task }
        }

        pub async fn shutdown(self) {
            self.task.abort();
        }
    }
}

use support::Node;

fn single_call_plan(status: u16, response_body: &str) -> Plan {
    Plan {
        execution: vec![Step::Call(Call {
            http: Http { status_code: status, response_body: Some(response_body.to_string()), ..Http::default() },
            ..Call::default()
        })],
    }
}

#[tokio::test]
async fn a_call_addressed_directly_responds_with_its_own_status_and_body() {
    // The entry location ("") always names the synthetic root, whose Http
    // is zero-valued — a real status/body only comes from addressing one
    // of the plan's own Calls, here execution[0] at location "0", the way
    // a parent's outbound request would.
    let node = Node::spawn().await;
    let client = reqwest::Client::new();

    let plan = single_call_plan(201, "created");
    let encoded = headers::encode_plan(&plan).unwrap();
    let builder = client.post(format!("http://{}/run-plan", node.addr));
    let builder = headers::write_plan_headers(builder, &encoded, "0", "t-1");
    let response = builder.send().await.unwrap();

    assert_eq!(response.status().as_u16(), 201);
    assert_eq!(response.text().await.unwrap(), "created");

    node.shutdown().await;
}

#[tokio::test]
async fn missing_plan_header_is_a_bad_request() {
    let node = Node::spawn().await;
    let client = reqwest::Client::new();

    let response = client.post(format!("http://{}/run-plan", node.addr)).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 400);

    node.shutdown().await;
}

#[tokio::test]
async fn an_out_of_range_location_is_a_bad_location_response() {
    let node = Node::spawn().await;
    let client = reqwest::Client::new();

    let plan = single_call_plan(200, "ok");
    let encoded = headers::encode_plan(&plan).unwrap();
    let builder = client.post(format!("http://{}/run-plan", node.addr));
    let builder = headers::write_plan_headers(builder, &encoded, "5", "t-2");
    let response = builder.send().await.unwrap();

    assert_eq!(response.status().as_u16(), 400);

    node.shutdown().await;
}

#[tokio::test]
async fn pre_execution_blocks_on_a_child_call_routed_back_to_the_same_node() {
    // Every `Step::Call` in an execution list is dispatched as a real
    // outbound HTTP request carrying the same plan and a location that
    // addresses the child within it — here the child loops back to this
    // same node. The parent's pre-execution waits for that round trip
    // before its own response (from its own Http, not the child's) is
    // written.
    let node = Node::spawn().await;
    let client = reqwest::Client::new();

    let plan = Plan {
        execution: vec![Step::Call(Call {
            http: Http { status_code: 200, response_body: Some("parent".into()), ..Http::default() },
            execution: vec![Step::Call(Call {
                http: Http {
                    method: "POST".into(),
                    url: format!("http://{}/run-plan", node.addr),
                    status_code: 200,
                    response_body: Some("child".into()),
                    ..Http::default()
                },
                ..Call::default()
            })],
            ..Call::default()
        })],
    };
    let encoded = headers::encode_plan(&plan).unwrap();
    let builder = client.post(format!("http://{}/run-plan", node.addr));
    let builder = headers::write_plan_headers(builder, &encoded, "0", "t-3");
    let response = builder.send().await.unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "parent");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(node.counters.outstanding(), 0);

    node.shutdown().await;
}

#[tokio::test]
async fn a_synchronous_compute_step_delays_the_response() {
    let node = Node::spawn().await;
    let client = reqwest::Client::new();

    let plan = Plan {
        execution: vec![Step::Compute(Compute {
            min: Duration::from_millis(60),
            max: Duration::from_millis(60),
            cpu: 0.0,
            memory_delta_kb: 0,
        })],
    };
    let encoded = headers::encode_plan(&plan).unwrap();
    let builder = client.post(format!("http://{}/run-plan", node.addr));
    let builder = headers::write_plan_headers(builder, &encoded, "", "t-4");
    let started = std::time::Instant::now();
    let response = builder.send().await.unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert!(started.elapsed() >= Duration::from_millis(55));

    node.shutdown().await;
}

#[tokio::test]
async fn a_loop_with_no_body_still_responds_and_drains() {
    let node = Node::spawn().await;
    let client = reqwest::Client::new();

    let plan = Plan {
        execution: vec![Step::Loop(Loop { times: 3, concurrency: 1, ..Loop::default() })],
    };
    let encoded = headers::encode_plan(&plan).unwrap();
    let builder = client.post(format!("http://{}/run-plan", node.addr));
    let builder = headers::write_plan_headers(builder, &encoded, "", "t-5");
    let response = builder.send().await.unwrap();

    assert_eq!(response.status().as_u16(), 200);

    node.shutdown().await;
}
