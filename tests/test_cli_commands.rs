//! End-to-end tests running the `ackline` binary.

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn ackline(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ackline"))
        .args(args)
        .output()
        .expect("failed to run ackline")
}

#[test]
fn validate_valid_config() {
    let config = fixture_path("dry_run.yaml");
    let output = ackline(&["validate", config.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "validate should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains(": ok"));
}

#[test]
fn validate_invalid_config_exits_with_config_error() {
    let config = fixture_path("invalid.yaml");
    let output = ackline(&["validate", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("duplicate recipient id"), "{stdout}");
    assert!(stdout.contains("transport.auth_token"), "{stdout}");
}

#[test]
fn validate_json_output() {
    let valid = fixture_path("dry_run.yaml");
    let invalid = fixture_path("invalid.yaml");
    let output = ackline(&[
        "validate",
        "--format",
        "json",
        valid.to_str().unwrap(),
        invalid.to_str().unwrap(),
    ]);
    assert!(!output.status.success());

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("output should be valid JSON");
    let reports = parsed.as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["valid"], true);
    assert_eq!(reports[1]["valid"], false);
}

#[test]
fn version_json() {
    let output = ackline(&["version", "--format", "json"]);
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["name"], "ackline");
}

#[test]
fn completions_bash() {
    let output = ackline(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("ackline"));
}

#[tokio::test]
async fn run_serves_webhook_and_alarm_api() {
    let config = fixture_path("dry_run.yaml");
    let mut child = tokio::process::Command::new(env!("CARGO_BIN_EXE_ackline"))
        .args([
            "run",
            "--config",
            config.to_str().unwrap(),
            "--dry-run",
            "-v",
            "--color",
            "never",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .expect("failed to spawn ackline");

    let stderr = child.stderr.take().expect("stderr not captured");
    let mut lines = BufReader::new(stderr).lines();
    let port = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(line) = lines.next_line().await.unwrap() {
            if !line.contains("ackline listening") {
                continue;
            }
            let start = line.find("127.0.0.1:").unwrap() + "127.0.0.1:".len();
            let digits: String = line[start..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            return digits.parse::<u16>().unwrap();
        }
        panic!("ackline exited before listening");
    })
    .await
    .expect("timed out waiting for ackline to listen");

    // Keep draining stderr so the child never blocks on a full pipe
    tokio::spawn(async move { while let Ok(Some(_)) = lines.next_line().await {} });

    let base = format!("http://127.0.0.1:{port}");
    let client = reqwest::Client::new();

    let trigger = client
        .post(format!("{base}/alarm/trigger"))
        .send()
        .await
        .unwrap();
    assert_eq!(trigger.status(), 200);
    let report: serde_json::Value = trigger.json().await.unwrap();
    assert_eq!(report["outcomes"][0]["success"], true);
    assert!(
        report["outcomes"][0]["diagnostic"]
            .as_str()
            .unwrap()
            .starts_with("dry-run-")
    );

    let webhook = client
        .post(format!("{base}/webhook/sms"))
        .form(&[("From", "+15550001"), ("Body", "yes"), ("MessageSid", "SM1")])
        .send()
        .await
        .unwrap();
    assert_eq!(webhook.status(), 200);
    assert!(webhook.text().await.unwrap().contains("<Response>"));

    let snapshot: serde_json::Value = client
        .get(format!("{base}/alarm"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["state"], "TRIGGERED");

    child.kill().await.unwrap();
}
