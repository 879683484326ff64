//! Plan-propagation headers: the wire contract that lets a Plan and the
//! caller's position inside it hop from one server instance to the next.
//!
//! Ported from `original_source/handler/header.go`. Header names are
//! renamed into this system's `X-App-*` family (see spec §6); the
//! right-to-left encoding-pipeline parser and the base64/no-padding +
//! JSON default encoding are carried over unchanged.

use base64::Engine;
use thiserror::Error;

use crate::plan::{codec, Plan};

pub const HEADER_PLAN: &str = "X-App-Plan";
pub const HEADER_PLAN_ENCODING: &str = "X-App-Plan-Encoding";
pub const HEADER_LOCATION: &str = "X-App-Loc";
pub const HEADER_REQUEST_TRACE: &str = "X-App-Request-Trace";

const DEFAULT_ENCODING: &str = "json; base64/no-padding";

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("missing required header {0}")]
    Missing(&'static str),
    #[error("empty plan encoding")]
    EmptyEncoding,
    #[error("invalid plan encoding {0:?}")]
    InvalidEncoding(String),
    #[error("invalid base64 in plan header: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid plan payload: {0}")]
    Payload(#[from] anyhow::Error),
}

/// An already-serialized Plan, carried alongside its decoded form so a
/// handler can re-emit the identical bytes to every outgoing child call
/// without paying to re-encode on each hop (spec §4.7's "optimization
/// contract").
#[derive(Debug, Clone)]
pub struct EncodedPlan {
    pub content: String,
    pub encoding: String,
}

/// Encodes a `Plan` as JSON then base64 (no padding), matching
/// `EncodePlan` in the original source.
pub fn encode_plan(plan: &Plan) -> anyhow::Result<EncodedPlan> {
    let json = codec::to_json(plan)?;
    let content = base64::engine::general_purpose::STANDARD_NO_PAD.encode(json);
    Ok(EncodedPlan { content, encoding: DEFAULT_ENCODING.to_string() })
}

/// Decodes a plan header value given its encoding descriptor. The
/// descriptor is a `;`-separated pipeline applied right to left:
/// intermediary codecs (`base64/no-padding`) decode bytes, while a
/// terminal codec (`json`/`yaml`) parses the plan and returns.
pub fn decode_plan(content: &str, encoding: &str) -> Result<Plan, HeaderError> {
    let chain: Vec<&str> = encoding.split(';').collect();
    if chain.is_empty() || encoding.trim().is_empty() {
        return Err(HeaderError::EmptyEncoding);
    }

    let mut bytes = content.as_bytes().to_vec();
    for codec_name in chain.iter().rev() {
        match codec_name.trim().to_lowercase().as_str() {
            "base64/no-padding" => {
                bytes = base64::engine::general_purpose::STANDARD_NO_PAD.decode(&bytes)?;
            }
            "json" => return Ok(self::codec::from_json(&bytes)?),
            "yaml" => return Ok(self::codec::from_yaml(&bytes)?),
            other => return Err(HeaderError::InvalidEncoding(other.to_string())),
        }
    }

    Err(HeaderError::InvalidEncoding(encoding.to_string()))
}

/// What a handler extracts from an inbound request's headers: the
/// decoded plan plus its still-encoded form, the location it was
/// addressed to, and the incoming trace id (if any).
pub struct InboundPlan {
    pub plan: Plan,
    pub encoded: EncodedPlan,
    pub location: String,
    pub trace_id: Option<String>,
}

pub fn read_plan_headers(headers: &axum::http::HeaderMap) -> Result<InboundPlan, HeaderError> {
    let content = header_str(headers, HEADER_PLAN)?.to_string();
    let encoding = header_str(headers, HEADER_PLAN_ENCODING)?.to_string();
    let plan = decode_plan(&content, &encoding)?;
    let location = headers
        .get(HEADER_LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let trace_id = headers.get(HEADER_REQUEST_TRACE).and_then(|v| v.to_str().ok()).map(String::from);
    Ok(InboundPlan { plan, encoded: EncodedPlan { content, encoding }, location, trace_id })
}

fn header_str<'a>(headers: &'a axum::http::HeaderMap, name: &'static str) -> Result<&'a str, HeaderError> {
    headers.get(name).and_then(|v| v.to_str().ok()).ok_or(HeaderError::Missing(name))
}

/// Sets the three plan-propagation headers plus the trace header on an
/// outgoing request, reusing an already-encoded plan.
pub fn write_plan_headers(
    builder: reqwest::RequestBuilder,
    encoded: &EncodedPlan,
    location: &str,
    trace_id: &str,
) -> reqwest::RequestBuilder {
    builder
        .header(HEADER_PLAN, &encoded.content)
        .header(HEADER_PLAN_ENCODING, &encoded.encoding)
        .header(HEADER_LOCATION, location)
        .header(HEADER_REQUEST_TRACE, trace_id)
}
