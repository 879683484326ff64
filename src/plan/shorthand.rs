//! Compact string grammars for `Compute` and `Http`, e.g. `"10ms to 200ms 1.3 cpu -100kb"`
//! or `"GET /svc 200 1024 2048"`. Ported from `original_source/plan/compute.go`
//! and `plan/http.go`'s `Parse` methods; the regex crate stands in for Go's
//! `regexp` package, which the teacher already depends on for context
//! interpolation and extraction patterns.

use std::collections::HashMap;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Compute, Http};

static COMPUTE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^(?P<min>\w+)
        (?:\s+to\s+(?P<max>\w+))?
        (?:\s+(?P<cpu>[\d.]+)\s*cpu)?
        (?:\s+(?P<sign>[+-])(?P<amount>[\d.]+)(?P<unit>kb|mb))?
        $
        ",
    )
    .expect("valid compute shorthand pattern")
});

static HTTP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^(?P<method>\w+)\s+
        (?P<url>\S+)\s+
        (?P<status>\d+)
        (?:\s+(?P<genreq>\d+)\s+(?P<genresp>\d+))?
        $
        ",
    )
    .expect("valid http shorthand pattern")
});

fn parse_go_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split_at = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .ok_or_else(|| format!("invalid duration {s:?}: missing unit"))?;
    let (number, unit) = s.split_at(split_at);
    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid duration {s:?}: {number:?} is not a number"))?;
    let nanos_per_unit: f64 = match unit {
        "ns" => 1.0,
        "us" | "µs" => 1_000.0,
        "ms" => 1_000_000.0,
        "s" => 1_000_000_000.0,
        "m" => 60.0 * 1_000_000_000.0,
        "h" => 3_600.0 * 1_000_000_000.0,
        other => return Err(format!("invalid duration {s:?}: unknown unit {other:?}")),
    };
    Ok(Duration::from_nanos((value * nanos_per_unit).round() as u64))
}

/// Parses `"MIN ( to MAX)? ( CPU cpu)? ( (+-N)(kb|mb) )?"`.
pub fn parse_compute(s: &str) -> Result<Compute, String> {
    let caps = COMPUTE_PATTERN
        .captures(s.trim())
        .ok_or_else(|| format!("cannot parse compute definition {s:?}"))?;

    let min = parse_go_duration(&caps["min"])?;
    let max = match caps.name("max") {
        Some(m) => parse_go_duration(m.as_str())?,
        None => min,
    };
    let cpu: f64 = match caps.name("cpu") {
        Some(c) => c
            .as_str()
            .parse()
            .map_err(|_| format!("invalid compute cpu {:?}", &caps["cpu"]))?,
        None => 0.0,
    };
    let memory_delta_kb: i64 = match caps.name("amount") {
        Some(amount) => {
            let magnitude: f64 = amount
                .as_str()
                .parse()
                .map_err(|_| format!("invalid memory delta {:?}", amount.as_str()))?;
            let signed = if &caps["sign"] == "-" { -magnitude } else { magnitude };
            let kb = match &caps["unit"] {
                "kb" => signed,
                "mb" => signed * 1024.0,
                other => return Err(format!("invalid memory delta unit {other:?}")),
            };
            kb as i64
        }
        None => 0,
    };

    Ok(Compute { min, max, cpu, memory_delta_kb })
}

/// Parses `"METHOD URL STATUS ( GEN_REQ GEN_RESP )?"`.
pub fn parse_http(s: &str) -> Result<Http, String> {
    let caps = HTTP_PATTERN
        .captures(s.trim())
        .ok_or_else(|| format!("cannot parse http definition {s:?}"))?;

    let status_code: u16 = caps["status"]
        .parse()
        .map_err(|_| format!("invalid http status code {:?}", &caps["status"]))?;
    let gen_request_body: usize = match caps.name("genreq") {
        Some(v) => v.as_str().parse().unwrap_or(0),
        None => 0,
    };
    let gen_response_body: usize = match caps.name("genresp") {
        Some(v) => v.as_str().parse().unwrap_or(0),
        None => 0,
    };

    Ok(Http {
        method: caps["method"].to_string(),
        url: caps["url"].to_string(),
        status_code,
        request_body: None,
        response_body: None,
        gen_request_body,
        gen_response_body,
        request_headers: HashMap::new(),
        response_headers: HashMap::new(),
    })
}
