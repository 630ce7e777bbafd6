// CLI integration tests for the `rapor` binary.
mod common;

use common::{Backend, Fallback, Primary, TestResult, closed_endpoint};
use serde_json::{Value, json};
use std::process::{Command, Output};

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_rapor");
    let mut command = Command::new(exe);
    command.env_remove("RAPOR_ENDPOINT").env_remove("RUST_LOG");
    command
}

fn parse_json(output: &[u8]) -> Value {
    let text = std::str::from_utf8(output).expect("utf8");
    serde_json::from_str(text.trim()).expect("valid json")
}

fn stderr_error(output: &Output) -> Value {
    let text = String::from_utf8_lossy(&output.stderr);
    let line = text
        .lines()
        .find(|line| line.starts_with("{\"error\""))
        .expect("error line");
    serde_json::from_str(line).expect("valid json")
}

#[test]
fn missing_endpoint_is_usage_error() {
    let output = cmd().args(["kelas", "list"]).output().expect("run");
    assert_eq!(output.status.code(), Some(2));
    let err = stderr_error(&output);
    assert_eq!(err["error"]["kind"], "Usage");
    assert!(err["error"]["hint"].as_str().unwrap().contains("RAPOR_ENDPOINT"));
}

#[test]
fn unknown_relation_key_is_rejected() -> TestResult<()> {
    let endpoint = closed_endpoint()?;
    let output = cmd()
        .args([
            "--endpoint",
            endpoint.as_str(),
            "kelas",
            "list",
            "--where",
            "siswa_id=1",
        ])
        .output()?;
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    Ok(())
}

#[test]
fn unreachable_backend_without_fallback_exits_remote() -> TestResult<()> {
    let endpoint = closed_endpoint()?;
    let output = cmd()
        .args(["--endpoint", endpoint.as_str(), "--no-fallback", "tugas", "list"])
        .output()?;
    assert_eq!(output.status.code(), Some(5));
    let body = parse_json(&output.stdout);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().starts_with("Request failed"));
    assert_eq!(stderr_error(&output)["error"]["kind"], "Remote");
    Ok(())
}

#[test]
fn unreachable_backend_reports_jsonp_failure() -> TestResult<()> {
    let endpoint = closed_endpoint()?;
    let output = cmd()
        .env("RAPOR_ENDPOINT", &endpoint)
        .args(["nilai", "get", "3"])
        .output()?;
    assert_eq!(output.status.code(), Some(5));
    assert_eq!(
        parse_json(&output.stdout),
        json!({"success": false, "error": "Failed to load data via JSONP"})
    );
    Ok(())
}

#[test]
fn create_prints_backend_reply() -> TestResult<()> {
    let backend = Backend::start(
        Primary::Json(r#"{"success":true,"id":42}"#),
        Fallback::NotFound,
    )?;
    let output = cmd()
        .args([
            "--endpoint",
            backend.endpoint(),
            "siswa",
            "create",
            "--data",
            r#"{"name":"Budi","kelas_id":1}"#,
        ])
        .output()?;
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(parse_json(&output.stdout), json!({"success": true, "id": 42}));

    let posts = backend.posts();
    assert_eq!(posts[0]["action"], "createSiswa");
    assert_eq!(posts[0]["name"], "Budi");
    assert_eq!(posts[0]["kelas_id"], "1");
    Ok(())
}

#[test]
fn class_options_prints_array() -> TestResult<()> {
    let backend = Backend::start(
        Primary::Html,
        Fallback::Callback(r#"{"success":true,"data":[{"id":1,"name":"10A"}]}"#),
    )?;
    let output = cmd()
        .args(["--endpoint", backend.endpoint(), "class-options"])
        .output()?;
    assert!(output.status.success());
    assert_eq!(parse_json(&output.stdout), json!([{"id": 1, "name": "10A"}]));
    assert_eq!(backend.loads().len(), 1);
    Ok(())
}

#[test]
fn completion_needs_no_endpoint() {
    let output = cmd().args(["completion", "bash"]).output().expect("run");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("rapor"));
}
