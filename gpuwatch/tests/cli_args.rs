//! CLI arg parsing tests for gpuwatch (client)
use std::fs;
use std::process::Command;

fn run_gpuwatch(config_home: &std::path::Path, args: &[&str]) -> (bool, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_gpuwatch"))
        .env("XDG_CONFIG_HOME", config_home)
        .args(args)
        .output()
        .expect("run gpuwatch");
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    (output.status.success(), text)
}

#[test]
fn test_help_mentions_short_and_long_flags() {
    let mut cmd = assert_cmd::Command::cargo_bin("gpuwatch").expect("binary built");
    let out = cmd.arg("--help").output().expect("run gpuwatch --help");
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stderr);
    assert!(
        text.contains("Usage:")
            && text.contains("--secure")
            && text.contains("-s")
            && text.contains("--endpoint")
            && text.contains("-e")
            && text.contains("--dry-run"),
        "help text missing expected flags\n{text}"
    );
}

#[test]
fn test_dry_run_defaults_to_local_agent() {
    let td = tempfile::tempdir().unwrap();
    let (ok, out) = run_gpuwatch(td.path(), &["--dry-run"]);
    assert!(ok, "{out}");
    assert!(out.contains("endpoint: ws://localhost:8000/ws"), "{out}");
    assert!(out.contains("\"history_len\": 60"), "{out}");
}

#[test]
fn test_dry_run_infers_secure_scheme() {
    let td = tempfile::tempdir().unwrap();
    let (ok, out) = run_gpuwatch(td.path(), &["-s", "--dry-run", "gpu-07:8000/ws"]);
    assert!(ok, "{out}");
    assert!(out.contains("endpoint: wss://gpu-07:8000/ws"), "{out}");
}

#[test]
fn test_config_file_candidates_and_selection() {
    let td = tempfile::tempdir().unwrap();
    let dir = td.path().join("gpuwatch");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("config.json"),
        r#"{"endpoints":{"candidates":["node-a:8000/ws","node-b:9000/ws"]},"tuning":{"chart_len":30}}"#,
    )
    .unwrap();

    let (ok, out) = run_gpuwatch(td.path(), &["--dry-run"]);
    assert!(ok, "{out}");
    assert!(out.contains("endpoint: ws://node-a:8000/ws"), "{out}");
    assert!(out.contains("\"chart_len\": 30"), "{out}");

    let (ok, out) = run_gpuwatch(td.path(), &["--endpoint", "1", "--dry-run"]);
    assert!(ok, "{out}");
    assert!(out.contains("endpoint: ws://node-b:9000/ws"), "{out}");
}

#[test]
fn test_invalid_endpoint_fails_dry_run() {
    let td = tempfile::tempdir().unwrap();
    let (ok, out) = run_gpuwatch(td.path(), &["--dry-run", "ws://"]);
    assert!(!ok, "expected failure\n{out}");
    assert!(out.contains("invalid endpoint"), "{out}");
}
