//! The plan execution engine: data model, scheduler, call executor,
//! header codec, and the axum handler/server/client wiring built on top
//! of them. Split into a library so integration tests can drive the
//! engine directly, with `main.rs` staying a thin CLI shell.

pub mod call;
pub mod client;
pub mod compute;
pub mod context;
pub mod errors;
pub mod fill;
pub mod handler;
pub mod headers;
pub mod outstanding;
pub mod plan;
pub mod rng;
pub mod scheduler;
pub mod server;
pub mod telemetry;
