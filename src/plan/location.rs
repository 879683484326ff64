//! Dot-joined integer paths that name a step inside a [`Plan`], e.g.
//! `"1.2.0"`. Ported from `original_source/handler/handler.go`'s
//! `locateInPlan`, extended per spec §4.7 to spill from a `Call`'s
//! `execution` into its `post_execution` once the index runs past the
//! former's length.

use thiserror::Error;

use super::{Call, Execution, Plan, Step};

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("bad location {location:?}: step #{index} ({raw:?}) is not an integer")]
    NotAnInteger { location: String, index: usize, raw: String },
    #[error("bad location {location:?}: index {index} out of range (execution has {len} steps)")]
    OutOfRange { location: String, index: i64, len: usize },
    #[error("bad location {location:?}: step #{index} does not have children to index into")]
    NotIndexable { location: String, index: usize },
    #[error("location {location:?} does not refer to a call")]
    NotACall { location: String },
}

/// The synthetic root: an implicit `Call` wrapping `plan.execution`, with
/// an empty `post_execution` and a defaulted (zero-value) `http`/`compute`.
/// `location == ""` always resolves to this node.
pub fn synthetic_root(plan: &Plan) -> Call {
    Call { execution: plan.execution.clone(), ..Call::default() }
}

/// Walks `location` from the synthetic root down to the `Call` it names.
/// Each hop indexes into the current step's `execution`, spilling into
/// `post_execution` when the index exceeds `execution`'s length (only
/// meaningful when the current step is itself a `Call`).
pub fn locate(plan: &Plan, location: &str) -> Result<Call, LocationError> {
    let mut current = synthetic_root(plan);
    if location.is_empty() {
        return Ok(current);
    }

    let parts: Vec<&str> = location.split('.').collect();
    for (depth, raw) in parts.iter().enumerate() {
        let idx: i64 = raw.parse().map_err(|_| LocationError::NotAnInteger {
            location: location.to_string(),
            index: depth,
            raw: raw.to_string(),
        })?;

        let step = index_into(&current.execution, &current.post_execution, idx, location, depth)?;

        if depth == parts.len() - 1 {
            return match step {
                Step::Call(c) => Ok(c),
                _ => Err(LocationError::NotACall { location: location.to_string() }),
            };
        }

        current = match step {
            Step::Call(c) => c,
            Step::Parallel(p) => Call { execution: p.execution, ..Call::default() },
            Step::Loop(l) => Call { execution: l.execution, ..Call::default() },
            Step::Compute(_) => {
                return Err(LocationError::NotIndexable { location: location.to_string(), index: depth })
            }
        };
    }

    unreachable!("location is non-empty, loop always returns")
}

fn index_into(
    execution: &Execution,
    post_execution: &Execution,
    idx: i64,
    location: &str,
    depth: usize,
) -> Result<Step, LocationError> {
    if idx < 0 {
        return Err(LocationError::OutOfRange {
            location: location.to_string(),
            index: idx,
            len: execution.len(),
        });
    }
    let idx = idx as usize;
    if idx < execution.len() {
        return Ok(execution[idx].clone());
    }
    let spill = idx - execution.len();
    if spill < post_execution.len() {
        return Ok(post_execution[spill].clone());
    }
    let _ = depth;
    Err(LocationError::OutOfRange {
        location: location.to_string(),
        index: idx as i64,
        len: execution.len() + post_execution.len(),
    })
}

/// Builds the location string for the `stepIdx`-th child of a node found
/// at `parent_location` (`""` at the root).
pub fn child_location(parent_location: &str, step_idx: usize) -> String {
    if parent_location.is_empty() {
        step_idx.to_string()
    } else {
        format!("{parent_location}.{step_idx}")
    }
}
