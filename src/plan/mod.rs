//! The Plan data model: a typed tree of steps describing synthetic service
//! calls, compute, and fan-out/fan-in control flow.
//!
//! This module only defines the types and their structural invariants.
//! Decoding (YAML/JSON, compact shorthand, flat-vs-nested maps) lives in
//! [`codec`] and [`shorthand`]; walking a location string into the tree
//! lives in [`location`].

pub mod codec;
pub mod location;
pub mod shorthand;

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// Root of a decoded plan. Immutable once built; shared read-only across
/// every hop of a running mesh.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub execution: Execution,
}

/// An ordered list of steps. Decoding goes through [`codec::deserialize_execution`]
/// so that each element's single discriminator key (`call`, `compute`,
/// `parallel`, `loop`) is recognized in both nested and flat map form.
pub type Execution = Vec<Step>;

/// One node in an [`Execution`].
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Call(Call),
    Compute(Compute),
    Parallel(Parallel),
    Loop(Loop),
}

impl Step {
    pub fn discriminator(&self) -> &'static str {
        match self {
            Step::Call(_) => "call",
            Step::Compute(_) => "compute",
            Step::Parallel(_) => "parallel",
            Step::Loop(_) => "loop",
        }
    }
}

/// A synthetic service call: optionally computes, then fans out into
/// `execution`, responds, then fans out into `post_execution`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Call {
    #[serde(default, rename = "async")]
    pub async_: bool,
    #[serde(default)]
    pub http: Http,
    #[serde(default)]
    pub compute: Compute,
    #[serde(default)]
    pub execution: Execution,
    #[serde(default, rename = "postExecution")]
    pub post_execution: Execution,
}

/// A simulated unit of work: sleep + multi-core CPU burn + memory delta.
///
/// `min == max == 0` is a no-op. Negative durations, or `min > max > 0`,
/// are invalid and silently treated as a no-op rather than surfaced as an
/// error — see spec §4.2 and the InvalidCompute open question in §9.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Compute {
    #[serde(with = "duration_millis")]
    pub min: Duration,
    #[serde(with = "duration_millis")]
    pub max: Duration,
    pub cpu: f64,
    #[serde(rename = "memoryDeltaKB")]
    pub memory_delta_kb: i64,
}

impl Default for Compute {
    fn default() -> Self {
        Self { min: Duration::ZERO, max: Duration::ZERO, cpu: 0.0, memory_delta_kb: 0 }
    }
}

impl Compute {
    pub fn is_zero(&self) -> bool {
        self.min.is_zero() && self.max.is_zero()
    }

    /// Mirrors `original_source/plan/compute.go`'s `Validate`: negative
    /// bounds, or min strictly greater than a nonzero max, are invalid.
    pub fn is_valid(&self) -> bool {
        if self.is_zero() {
            return true;
        }
        if self.min > self.max && !self.max.is_zero() {
            return false;
        }
        true
    }
}

#[derive(Deserialize)]
struct ComputeFields {
    #[serde(with = "duration_millis", default)]
    min: Duration,
    #[serde(with = "duration_millis", default)]
    max: Duration,
    #[serde(default)]
    cpu: f64,
    #[serde(default, rename = "memoryDeltaKB")]
    memory_delta_kb: i64,
}

impl From<ComputeFields> for Compute {
    fn from(f: ComputeFields) -> Self {
        Self { min: f.min, max: f.max, cpu: f.cpu, memory_delta_kb: f.memory_delta_kb }
    }
}

impl<'de> Deserialize<'de> for Compute {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Shorthand(String),
            Full(ComputeFields),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Shorthand(s) => {
                shorthand::parse_compute(&s).map_err(serde::de::Error::custom)
            }
            Repr::Full(f) => Ok(f.into()),
        }
    }
}

/// Fan out `execution`'s children across up to `concurrency` workers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Parallel {
    #[serde(default)]
    pub concurrency: i32,
    #[serde(default)]
    pub execution: Execution,
}

/// Run `execution` (followed by `compute`) `times` times, either
/// sequentially or through a fan-out of `concurrency` workers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Loop {
    #[serde(default)]
    pub times: i32,
    #[serde(default)]
    pub concurrency: i32,
    #[serde(default)]
    pub compute: Compute,
    #[serde(default)]
    pub execution: Execution,
}

/// Description of one synthetic HTTP call: what to send, and what the
/// receiving node's response should look like.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Http {
    pub method: String,
    pub url: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(rename = "responseBody", skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(rename = "genRequestBody")]
    pub gen_request_body: usize,
    #[serde(rename = "genResponseBody")]
    pub gen_response_body: usize,
    #[serde(rename = "requestHeaders")]
    pub request_headers: HashMap<String, String>,
    #[serde(rename = "responseHeaders")]
    pub response_headers: HashMap<String, String>,
}

impl Default for Http {
    fn default() -> Self {
        Self {
            method: default_method(),
            url: String::new(),
            status_code: 0,
            request_body: None,
            response_body: None,
            gen_request_body: 0,
            gen_response_body: 0,
            request_headers: HashMap::new(),
            response_headers: HashMap::new(),
        }
    }
}

#[derive(Deserialize)]
struct HttpFields {
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    url: String,
    #[serde(default, rename = "statusCode")]
    status_code: u16,
    #[serde(default, rename = "requestBody")]
    request_body: Option<String>,
    #[serde(default, rename = "responseBody")]
    response_body: Option<String>,
    #[serde(default, rename = "genRequestBody")]
    gen_request_body: usize,
    #[serde(default, rename = "genResponseBody")]
    gen_response_body: usize,
    #[serde(default, rename = "requestHeaders")]
    request_headers: HashMap<String, String>,
    #[serde(default, rename = "responseHeaders")]
    response_headers: HashMap<String, String>,
}

impl From<HttpFields> for Http {
    fn from(f: HttpFields) -> Self {
        Self {
            method: f.method,
            url: f.url,
            status_code: f.status_code,
            request_body: f.request_body,
            response_body: f.response_body,
            gen_request_body: f.gen_request_body,
            gen_response_body: f.gen_response_body,
            request_headers: f.request_headers,
            response_headers: f.response_headers,
        }
    }
}

impl<'de> Deserialize<'de> for Http {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Shorthand(String),
            Full(HttpFields),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Shorthand(s) => shorthand::parse_http(&s).map_err(serde::de::Error::custom),
            Repr::Full(f) => Ok(f.into()),
        }
    }
}

fn default_method() -> String {
    "GET".to_string()
}

/// `Duration` has no canonical serde representation, and this system needs
/// human compact-string and plain millisecond-JSON forms side by side. The
/// structured field form (used once shorthand parsing, if any, has already
/// happened) always serializes/deserializes at millisecond granularity.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
