//! Exercises `plan::codec::load_file`'s file/stdin path and extension
//! sniffing, which the in-module unit tests (operating on in-memory
//! strings) don't reach.

use callmesh::plan::codec::load_file;
use callmesh::plan::{Call, Http, Plan, Step};

fn sample_plan() -> Plan {
    Plan {
        execution: vec![Step::Call(Call {
            http: Http { method: "GET".into(), url: "/a".into(), status_code: 200, ..Http::default() },
            ..Call::default()
        })],
    }
}

#[test]
fn loads_yaml_by_default_extension() {
    let dir = tempdir();
    let path = dir.join("plan.yaml");
    std::fs::write(&path, "execution:\n  - call:\n      http: \"GET /a 200\"\n").unwrap();

    let plan = load_file(path.to_str().unwrap()).unwrap();
    assert_eq!(plan, sample_plan());
}

#[test]
fn loads_json_when_extension_is_json() {
    let dir = tempdir();
    let path = dir.join("plan.json");
    let json = callmesh::plan::codec::to_json_pretty(&sample_plan()).unwrap();
    std::fs::write(&path, json).unwrap();

    let plan = load_file(path.to_str().unwrap()).unwrap();
    assert_eq!(plan, sample_plan());
}

#[test]
fn an_extensionless_path_is_treated_as_yaml() {
    let dir = tempdir();
    let path = dir.join("planfile");
    std::fs::write(&path, "execution:\n  - call:\n      http: \"GET /a 200\"\n").unwrap();

    let plan = load_file(path.to_str().unwrap()).unwrap();
    assert_eq!(plan, sample_plan());
}

#[test]
fn a_missing_file_is_an_error() {
    let dir = tempdir();
    let path = dir.join("does-not-exist.yaml");
    assert!(load_file(path.to_str().unwrap()).is_err());
}

fn tempdir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("callmesh-codec-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
