use assert_cmd::Command;
use input_linux_sys::{EV_ABS, EV_KEY};
use predicates::prelude::*;
use serde_json::Value;
use std::path::PathBuf;

// Use the dev-dependency crate for helpers
use test_helpers::*;

fn tapmeter() -> Command {
    let mut cmd = Command::cargo_bin("tapmeter").unwrap();
    cmd.env("RUST_LOG", "error").env("NO_COLOR", "1");
    cmd
}

/// Two A presses: 30 ms then 80 ms.
fn two_taps() -> Vec<u8> {
    let mut events = tap(BTN_SOUTH, 1_000_000, 1_030_000);
    events.extend(tap(BTN_SOUTH, 2_000_000, 2_080_000));
    events_to_bytes(&events)
}

fn stdout_json(output: &std::process::Output) -> Value {
    let stdout = String::from_utf8(output.stdout.clone()).expect("Stdout not valid UTF-8");
    serde_json::from_str(stdout.trim()).unwrap_or_else(|e| panic!("Failed to parse JSON: {e}\nStdout:\n{stdout}"))
}

fn history_file(name: &str, lines: &[&str]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("tapmeter-{}-{name}.jsonl", std::process::id()));
    std::fs::write(&path, lines.join("\n")).expect("Failed to write history file");
    path
}

// --- buttons ---

#[test]
fn buttons_lists_canonical_names() {
    let output = tapmeter().arg("buttons").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let names: Vec<&str> = stdout.lines().collect();
    assert_eq!(names.len(), 14);
    assert_eq!(names.first(), Some(&"A"));
    assert_eq!(names.last(), Some(&"D-Pad Y"));
}

// --- monitor ---

#[test]
fn summary_json_from_stdin_capture() {
    let output = tapmeter()
        .args(["monitor", "--stdin", "--summary-json", "--device-name", "Xbox Wireless Controller"])
        .write_stdin(two_taps())
        .output()
        .unwrap();
    assert!(output.status.success(), "exit status {:?}", output.status);

    let summary = stdout_json(&output);
    assert_eq!(summary["button"], "All");
    assert_eq!(summary["press_count"], 2);
    assert_eq!(summary["min_duration_ms"], 30.0);
    assert_eq!(summary["max_duration_ms"], 80.0);
    assert_eq!(summary["avg_duration_ms"], 55.0);
    assert_eq!(summary["threshold_ms"], 50.0);
    assert_eq!(summary["threshold_successes"], 1);
    assert_eq!(summary["connection_type"], "Bluetooth");
}

#[test]
fn human_stats_on_exit() {
    tapmeter()
        .args(["monitor", "--stdin", "--threshold", "100"])
        .write_stdin(two_taps())
        .assert()
        .success()
        .stderr(predicate::str::contains("tapmeter status (Cumulative)"))
        .stderr(predicate::str::contains("Total Presses: 2"))
        .stderr(predicate::str::contains("Under Threshold: 2 / 2 (100.0%)"))
        .stderr(predicate::str::contains("Button [A]: 2"))
        .stderr(predicate::str::contains("Connection Quality: N/A"));
}

#[test]
fn stats_json_on_exit() {
    let output = tapmeter()
        .args(["monitor", "--stdin", "--stats-json"])
        .write_stdin(two_taps())
        .output()
        .unwrap();
    assert!(output.status.success());

    let stderr = String::from_utf8(output.stderr).expect("Stderr not valid UTF-8");
    let json_start_index = stderr.find('{').expect("No JSON block start '{' found in stderr");
    let stats: Value = serde_json::from_str(&stderr[json_start_index..])
        .unwrap_or_else(|e| panic!("Failed to parse JSON from stderr: {e}\nStderr:\n{stderr}"));

    assert_eq!(stats["report_type"], "Cumulative");
    assert_eq!(stats["meta"]["device_name"], "stdin");
    assert_eq!(stats["stats"]["total_presses"], 2);
    assert_eq!(stats["stats"]["min_duration_ms"], 30.0);
    assert_eq!(stats["stats"]["threshold_successes"], 1);
    assert_eq!(stats["stats"]["success_rate_pct"], 50.0);
    assert_eq!(stats["stats"]["below_threshold"], false);
    assert!(stats["stats"].get("durations_history").is_none());
    assert_eq!(stats["diagnostics"]["connection_quality"], "N/A");
}

#[test]
fn empty_capture_reports_no_presses() {
    let output = tapmeter()
        .args(["monitor", "--stdin", "--stats-json", "--summary-json"])
        .write_stdin(Vec::new())
        .output()
        .unwrap();
    assert!(output.status.success());
    let summary = stdout_json(&output);
    assert_eq!(summary["press_count"], 0);
    assert_eq!(summary["min_duration_ms"], 0.0);

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("\"min_duration_ms\": null"), "stderr:\n{stderr}");
}

#[test]
fn button_filter_and_trigger_debounce() {
    // RT crosses the threshold once (wobbling above it), A is ignored.
    let mut events = report(1_000_000, &[(EV_KEY, BTN_SOUTH, 1), (EV_ABS, ABS_RZ, 60)]);
    events.extend(report(1_004_000, &[(EV_ABS, ABS_RZ, 200)]));
    events.extend(report(1_008_000, &[(EV_ABS, ABS_RZ, 255)]));
    events.extend(report(1_012_000, &[(EV_ABS, ABS_RZ, 180)]));
    events.extend(report(1_044_000, &[(EV_ABS, ABS_RZ, 20), (EV_KEY, BTN_SOUTH, 0)]));

    let output = tapmeter()
        .args(["monitor", "--stdin", "--summary-json", "--button", "rt"])
        .write_stdin(events_to_bytes(&events))
        .output()
        .unwrap();
    assert!(output.status.success());
    let summary = stdout_json(&output);
    assert_eq!(summary["button"], "RT");
    assert_eq!(summary["press_count"], 1);
    assert_eq!(summary["min_duration_ms"], 40.0);
}

#[test]
fn custom_trigger_threshold() {
    let mut events = report(1_000_000, &[(EV_ABS, ABS_Z, 100)]);
    events.extend(report(1_020_000, &[(EV_ABS, ABS_Z, 0)]));
    let bytes = events_to_bytes(&events);

    let default_run = tapmeter()
        .args(["monitor", "--stdin", "--summary-json"])
        .write_stdin(bytes.clone())
        .output()
        .unwrap();
    assert_eq!(stdout_json(&default_run)["press_count"], 0);

    let low_run = tapmeter()
        .args(["monitor", "--stdin", "--summary-json", "--trigger-threshold", "50"])
        .write_stdin(bytes)
        .output()
        .unwrap();
    assert_eq!(stdout_json(&low_run)["press_count"], 1);
}

#[test]
fn log_presses_marks_fast_and_slow() {
    tapmeter()
        .args(["monitor", "--stdin", "--log-presses"])
        .write_stdin(two_taps())
        .assert()
        .success()
        .stderr(predicate::str::contains("[FAST]"))
        .stderr(predicate::str::contains("[SLOW]"))
        .stderr(predicate::str::contains("Button [A] held 30.00 ms"));
}

#[test]
fn unknown_button_is_rejected() {
    tapmeter()
        .args(["monitor", "--stdin", "--button", "Turbo"])
        .write_stdin(Vec::new())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown button 'Turbo'"));
}

#[test]
fn missing_device_exits_3() {
    tapmeter()
        .args(["monitor", "--device", "/nonexistent/tapmeter-test-device"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No controller found"));
}

// --- report ---

const HISTORY: [&str; 4] = [
    r#"{"timestamp":"2026-01-01T10:00:00","button":"A","press_count":20,"min_duration_ms":80.0,"avg_duration_ms":110.0,"connection_type":"USB","latency_avg_ms":4.0,"jitter_ms":1.0}"#,
    r#"{"timestamp":"2026-01-02T10:00:00","button":"A","press_count":20,"min_duration_ms":80.0,"avg_duration_ms":100.0,"connection_type":"Bluetooth","latency_avg_ms":8.0,"jitter_ms":3.0}"#,
    r#"{"timestamp":"2026-01-03T10:00:00","button":"A","press_count":20,"min_duration_ms":50.0,"avg_duration_ms":90.0,"connection_type":"USB","latency_avg_ms":4.0,"jitter_ms":1.0}"#,
    r#"{"timestamp":"2026-01-04T10:00:00","button":"A","press_count":20,"min_duration_ms":50.0,"avg_duration_ms":80.0,"connection_type":"USB","latency_avg_ms":2.0,"jitter_ms":1.0}"#,
];

#[test]
fn report_json_compares_sessions() {
    let path = history_file("json", &HISTORY);
    let output = tapmeter()
        .args(["report", "--json", "--sessions"])
        .arg(&path)
        .output()
        .unwrap();
    let _ = std::fs::remove_file(&path);
    assert!(output.status.success());

    let report = stdout_json(&output);
    assert_eq!(report["comparison"]["sessions"], 4);
    assert_eq!(report["comparison"]["best_min_duration_ms"], 50.0);
    assert_eq!(report["comparison"]["mean_avg_duration_ms"], 95.0);
    assert_eq!(report["comparison"]["trend"], "improving");
    assert_eq!(report["comparison"]["mean_latency_ms"], 4.5);
    assert_eq!(report["comparison"]["best_latency_ms"], 2.0);
    assert_eq!(report["by_connection"]["USB"]["sessions"], 3);
    assert_eq!(report["by_connection"]["Bluetooth"]["mean_latency_ms"], 8.0);
    assert_eq!(report["average_distribution"]["median_ms"], 95.0);
}

#[test]
fn report_human_output() {
    let path = history_file("human", &HISTORY);
    let output = tapmeter().args(["report", "--sessions"]).arg(&path).output().unwrap();
    let _ = std::fs::remove_file(&path);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Sessions: 4"), "stdout:\n{stdout}");
    assert!(stdout.contains("Trend: improving"));
    assert!(stdout.contains("Bluetooth: 1 sessions"));
}

#[test]
fn report_missing_file_exits_4() {
    tapmeter()
        .args(["report", "--sessions", "/nonexistent/tapmeter-history.jsonl"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Cannot read session history"));
}

#[test]
fn report_malformed_file_exits_4() {
    let path = history_file("malformed", &["{\"press_count\": \"many\"}"]);
    let assert = tapmeter().args(["report", "--sessions"]).arg(&path).assert();
    let _ = std::fs::remove_file(&path);
    assert.code(4).stderr(predicate::str::contains("Malformed session history"));
}

#[test]
fn report_empty_history_is_not_an_error() {
    let path = history_file("empty", &[]);
    let assert = tapmeter().args(["report", "--sessions"]).arg(&path).assert();
    let _ = std::fs::remove_file(&path);
    assert.success().stderr(predicate::str::contains("Nothing to report"));
}

// --- packaging ---

#[test]
fn readme_covers_every_subcommand() {
    let readme = std::fs::read_to_string(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("README.md"))
        .expect("README.md referenced by Cargo.toml is missing");
    for subcommand in ["tapmeter monitor", "tapmeter report", "tapmeter buttons"] {
        assert!(readme.contains(subcommand), "README does not mention `{subcommand}`");
    }
}
