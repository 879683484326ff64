//! Plan (de)serialization: YAML/JSON round-trip, and the discriminator-key
//! handling that lets each `Step` be written either nested under its tag
//! or "flat" with the tag's value left null and its fields as siblings.
//!
//! Ported from `original_source/plan/execution.go`'s `MarshalYAML`/
//! `UnmarshalYAML` pair, generalized to also work through `serde_json`
//! (the Go source has separate, near-identical JSON logic; here both
//! formats funnel through the same `serde_json::Value` intermediate so
//! there is exactly one implementation of the discriminator/flat-form
//! rules).

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::de::Error as DeError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::{Call, Compute, Loop, Parallel, Plan, Step};

pub fn from_json(data: &[u8]) -> anyhow::Result<Plan> {
    Ok(serde_json::from_slice(data)?)
}

pub fn from_yaml(data: &[u8]) -> anyhow::Result<Plan> {
    Ok(serde_yaml::from_slice(data)?)
}

pub fn to_json(plan: &Plan) -> anyhow::Result<Vec<u8>> {
    Ok(serde_json::to_vec(plan)?)
}

pub fn to_json_pretty(plan: &Plan) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(plan)?)
}

pub fn to_yaml(plan: &Plan) -> anyhow::Result<String> {
    Ok(serde_yaml::to_string(plan)?)
}

/// Loads a plan from a file path, or from stdin when `path == "-"`.
/// YAML is assumed unless the extension is `.json`, matching the client
/// CLI's `readPlan` in `original_source/cmd/client/main.go` (which always
/// reads YAML) generalized to accept both formats this crate supports.
pub fn load_file(path: &str) -> anyhow::Result<Plan> {
    let data = if path == "-" {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        buf
    } else {
        fs::read(path)?
    };
    if Path::new(path).extension().and_then(|e| e.to_str()) == Some("json") {
        from_json(&data)
    } else {
        from_yaml(&data)
    }
}

// ---------------------------------------------------------------------
// Step <-> tagged-map conversion, shared by both the JSON and YAML paths
// ---------------------------------------------------------------------

impl Serialize for Step {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Step::Call(v) => map.serialize_entry("call", v)?,
            Step::Compute(v) => map.serialize_entry("compute", v)?,
            Step::Parallel(v) => map.serialize_entry("parallel", v)?,
            Step::Loop(v) => map.serialize_entry("loop", v)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut value = Value::deserialize(deserializer)?;
        let obj = value
            .as_object_mut()
            .ok_or_else(|| DeError::custom("a step must be a map with a single discriminator key"))?;

        // Flat form: exactly one key has a null value, with siblings alongside it.
        // The discriminator is that null-valued key; everything else (the
        // siblings) becomes the step's body.
        let flat_key = obj
            .iter()
            .find(|(_, v)| v.is_null())
            .map(|(k, _)| k.clone());

        let (tag, body) = if let Some(key) = flat_key {
            let mut body = Map::new();
            for (k, v) in obj.iter() {
                if *k != key {
                    body.insert(k.clone(), v.clone());
                }
            }
            (key, Value::Object(body))
        } else {
            if obj.len() != 1 {
                return Err(DeError::custom(format!(
                    "a step must have exactly one discriminator key, got {}",
                    obj.len()
                )));
            }
            let (tag, body) = obj.iter().next().unwrap();
            (tag.clone(), body.clone())
        };

        match tag.as_str() {
            "call" => Ok(Step::Call(
                serde_json::from_value::<Call>(body).map_err(DeError::custom)?,
            )),
            "compute" => Ok(Step::Compute(
                serde_json::from_value::<Compute>(body).map_err(DeError::custom)?,
            )),
            "parallel" => Ok(Step::Parallel(
                serde_json::from_value::<Parallel>(body).map_err(DeError::custom)?,
            )),
            "loop" => Ok(Step::Loop(
                serde_json::from_value::<Loop>(body).map_err(DeError::custom)?,
            )),
            other => Err(DeError::custom(format!("unrecognized step type {other:?}"))),
        }
    }
}

// Forwarding through serde_json::Value above means a step's Compute/Http
// shorthand parsing (which is itself driven by serde, see plan::shorthand)
// runs uniformly whether the outer document was JSON or YAML: both
// deserialize `Step` generically over `D: Deserializer<'de>`, immediately
// buffering into `serde_json::Value` before the discriminator is resolved.
