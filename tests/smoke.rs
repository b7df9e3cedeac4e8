use std::{
    io::{Read, Write},
    net::TcpListener,
    thread,
};

use assert_cmd::Command;
use predicates::prelude::*;

const BODY: &str = "{\"_msg\":\"first\"}\n{\"_msg\":\"second\"}\n";

/// Answers one request with `BODY` and hands back the raw request.
fn serve_once() -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(head_end) = buf.windows(4).position(|window| window == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
            let content_length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + content_length {
                break;
            }
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{BODY}",
            BODY.len()
        );
        socket.write_all(response.as_bytes()).unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    });
    (format!("http://{addr}"), handle)
}

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("vlogs-export").unwrap();
    for var in [
        "VLOGS_EXPORT_SERVER",
        "VLOGS_EXPORT_OUTPUT_DIR",
        "VLOGS_EXPORT_ON_CLOSE",
        "VLOGS_EXPORT_TIMEOUT_SECS",
        "VLOGS_EXPORT_DEBUG_DELAY_MS",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn prints_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("export"));
}

#[test]
fn bad_argument_fails() {
    cmd()
        .arg("--does-not-exist")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn malformed_param_is_rejected() {
    cmd()
        .args(["export", "--param", "no-equals-sign"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("KEY=VALUE"));
}

#[test]
fn invalid_close_policy_fails() {
    cmd()
        .args(["--on-close", "sometimes", "export"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("on-close policy"));
}

#[test]
fn export_reports_unreachable_server() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .args(["export", "--query", "*", "--server", "http://127.0.0.1:9"])
        .args(["--timeout-secs", "5", "--output-dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Request failed"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn export_prints_saved_path() {
    let (server, handle) = serve_once();
    let dir = tempfile::tempdir().unwrap();
    let expected = dir.path().join("errors.jsonl");
    cmd()
        .args(["export", "--filename", "errors", "--query", "error", "--server"])
        .arg(&server)
        .arg("--output-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(expected.display().to_string()));

    assert_eq!(std::fs::read_to_string(&expected).unwrap(), BODY);
    assert!(handle.join().unwrap().contains("query=error"));
}

#[test]
fn export_json_reports_path_bytes_and_lines() {
    let (server, handle) = serve_once();
    let dir = tempfile::tempdir().unwrap();
    let output = cmd()
        .args(["export", "--json", "--query", "*", "--server"])
        .arg(&server)
        .arg("--output-dir")
        .arg(dir.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let summary: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let expected = dir.path().join("vmui_logs_export.jsonl");
    assert_eq!(summary["path"], expected.display().to_string());
    assert_eq!(summary["bytes"], BODY.len() as u64);
    assert_eq!(summary["lines"], 2);
    handle.join().unwrap();
}
