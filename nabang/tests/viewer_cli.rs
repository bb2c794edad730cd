//! Smoke tests of the viewer binary against prepared log files.

use assert_cmd::Command;
use nabang::LogWriter;

#[test]
fn drains_a_sealed_log_and_exits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nabang.blog");

    let writer = LogWriter::create(&path).unwrap();
    writer.stamp("boot");
    writer.set_value("answer", 42);
    writer.set_text("status", "done");
    writer.terminate();

    let output = Command::cargo_bin("nabang-view")
        .unwrap()
        .arg(&path)
        .arg("--once")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[stamp] boot"));
    assert!(stdout.contains("[set] answer = 42"));
    assert!(stdout.contains("[set] status = \"done\""));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("log closed by the writer"));
}

#[test]
fn missing_log_is_an_error_when_draining() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.blog");

    let output = Command::cargo_bin("nabang-view")
        .unwrap()
        .arg(&path)
        .arg("--once")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn drains_an_open_log_without_blocking() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nabang.blog");

    let writer = LogWriter::create(&path).unwrap();
    writer.stamp("still-running");
    // No terminate: the page stays open, `--once` must stop at the first
    // idle poll instead of following.

    let output = Command::cargo_bin("nabang-view")
        .unwrap()
        .arg(&path)
        .arg("--once")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[stamp] still-running"));
}
