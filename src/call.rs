//! Sends one synthetic HTTP call, sync or async, per spec §4.5.
//!
//! Ported from `original_source/handler/step.go`'s `call` method: body
//! selection order, header merging, and plan/trace header propagation
//! are all carried over; async dispatch is new (the reference version
//! this was distilled from predates the `async` field) and is grounded
//! instead in spec §4.5/§9's "async call lifetime" design note.

use anyhow::{anyhow, Context as _};
use tracing::warn;

use crate::context::RequestContext;
use crate::headers;
use crate::plan::Call;
use crate::rng;

pub async fn execute(call: &Call, location: &str, ctx: &RequestContext) -> anyhow::Result<()> {
    if call.async_ {
        spawn_async(call.clone(), location.to_string(), ctx.clone());
        return Ok(());
    }
    send(call, location, ctx).await
}

fn spawn_async(call: Call, location: String, ctx: RequestContext) {
    ctx.async_wg.add(1);
    let wg = ctx.async_wg.clone();
    tokio::spawn(async move {
        if let Err(err) = send(&call, &location, &ctx).await {
            warn!(%location, error = %err, "async call failed");
        }
        wg.done();
    });
}

async fn send(call: &Call, location: &str, ctx: &RequestContext) -> anyhow::Result<()> {
    let body = request_body(call);
    let method = reqwest::Method::from_bytes(call.http.method.as_bytes())
        .map_err(|e| anyhow!("invalid http method {:?}: {e}", call.http.method))?;

    let mut builder = ctx.client.request(method, call.http.url.as_str()).body(body);
    for (key, value) in &call.http.request_headers {
        builder = builder.header(key, value);
    }

    let trace_id = rng::next_trace_id(Some(&ctx.trace_id));
    builder = headers::write_plan_headers(builder, &ctx.encoded, location, &trace_id);

    tokio::select! {
        result = builder.send() => {
            result.with_context(|| format!("call to {} failed", call.http.url))?;
            Ok(())
        }
        _ = ctx.cancel.cancelled() => {
            Err(anyhow!("call to {} cancelled", call.http.url))
        }
    }
}

fn request_body(call: &Call) -> String {
    if let Some(body) = &call.http.request_body {
        if !body.is_empty() {
            return body.clone();
        }
    }
    if call.http.gen_request_body > 0 {
        return rng::random_string(call.http.gen_request_body);
    }
    String::new()
}
