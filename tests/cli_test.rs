#![cfg(not(target_arch = "wasm32"))]

use assert_cmd::Command;
use std::path::PathBuf;

fn out_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("tcx-lapfix-{}-{name}", std::process::id()))
}

#[test]
fn test_summary_json_on_stdout() {
    let out = out_path("three_laps-fixed.tcx");
    let output = Command::cargo_bin("tcx-lapfix")
        .unwrap()
        .args(["fix", "tests/fixtures/three_laps.tcx", "tests/fixtures/three_laps.txt"])
        .arg("--output")
        .arg(&out)
        .arg("--summary-json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["laps"].as_array().unwrap().len(), 3);
    assert!((summary["totalMeters"].as_f64().unwrap() - 4828.02).abs() < 0.01);

    // per-lap lines still reach the user, on stderr
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("lap 1"));
    assert!(out.exists());
    std::fs::remove_file(&out).unwrap();
}

#[test]
fn test_failure_writes_nothing() {
    let out = out_path("mismatch-fixed.tcx");
    let laps = out_path("two.txt");
    std::fs::write(&laps, "1.0\n1.0\n").unwrap();

    Command::cargo_bin("tcx-lapfix")
        .unwrap()
        .args(["fix", "tests/fixtures/three_laps.tcx"])
        .arg(&laps)
        .arg("--output")
        .arg(&out)
        .assert()
        .failure();
    assert!(!out.exists());
    std::fs::remove_file(&laps).unwrap();
}

#[test]
fn test_laps_template_command() {
    let out = out_path("steady-laps.txt");
    Command::cargo_bin("tcx-lapfix")
        .unwrap()
        .args(["laps", "tests/fixtures/steady.tcx", "--output"])
        .arg(&out)
        .assert()
        .success();
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "1.000\n1.000\n1.000\n");
    std::fs::remove_file(&out).unwrap();
}
