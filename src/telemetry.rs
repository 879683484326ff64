//! Logging setup. The teacher wires `tracing` through an OpenTelemetry
//! OTLP pipeline for distributed traces across test-runner invocations;
//! this system's calls are themselves the distributed trace (propagated
//! via `X-App-Request-Trace`), so a plain `tracing-subscriber` fmt layer
//! driven by `RUST_LOG` is the whole ambient logging stack here — no
//! exporter, no collector dependency.

use tracing_subscriber::EnvFilter;

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}
