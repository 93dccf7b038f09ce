use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::TempDir;

use codegrader::config::GraderConfig;
use codegrader::isolate::{GradeRequest, grade_in_subprocess};
use codegrader::report::GradeReport;

const PYTHON_ECHO: &str = "import sys\nwith open(sys.argv[1]) as f:\n    print(f.read().strip())\n";

fn toolchain_available(binary: &str) -> bool {
    std::process::Command::new("which")
        .arg(binary)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn write_fixtures(root: &Path) {
    fs::write(root.join("echo-sample.in"), "5\n").unwrap();
    fs::write(root.join("echo-sample.out"), "5\n").unwrap();
    fs::write(root.join("echo.in"), "12\n").unwrap();
    fs::write(root.join("echo.out"), "12\n").unwrap();
}

fn envelope(source: &str) -> String {
    let body = serde_json::json!({
        "student_response": source,
        "grader_payload": r#"{"problem_name": "echo", "timeout": 5, "grader": "test_grader"}"#,
        "student_info": r#"{"is_staff": false}"#,
    });
    serde_json::json!({ "xqueue_body": body.to_string() }).to_string()
}

/// Spawns the real grader binary and feeds it `stdin_bytes`, returning the
/// finished process output.
fn run_grader_binary(args: &[&str], stdin_bytes: &[u8]) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_codegrader"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn grader binary");
    child
        .stdin
        .as_mut()
        .expect("grader binary has no stdin")
        .write_all(stdin_bytes)
        .unwrap();
    // Drop the handle so the grader sees end-of-input.
    drop(child.stdin.take());
    child.wait_with_output().unwrap()
}

#[test]
fn forked_grade_round_trips_through_the_child_binary() {
    if !toolchain_available("python3") {
        eprintln!("python3 not found, skipping");
        return;
    }
    let fixtures = TempDir::new().unwrap();
    write_fixtures(fixtures.path());

    let fixture_root = fixtures.path().to_string_lossy().into_owned();
    let output = run_grader_binary(
        &["--fixture-root", &fixture_root],
        envelope(PYTHON_ECHO).as_bytes(),
    );

    assert!(
        output.status.success(),
        "grader failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let reply: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(reply["correct"], true);
    assert_eq!(reply["score"], 1);
    assert!(reply["msg"].as_str().unwrap().contains("CORRECT"));
}

#[test]
fn child_mode_emits_exactly_one_report() {
    if !toolchain_available("python3") {
        eprintln!("python3 not found, skipping");
        return;
    }
    let fixtures = TempDir::new().unwrap();
    write_fixtures(fixtures.path());

    let request = GradeRequest {
        fixture_root: fixtures.path().to_path_buf(),
        config: GraderConfig {
            problem_name: "echo".to_string(),
            timeout: 5,
            is_staff: false,
            grader: "test_grader".to_string(),
        },
        source: PYTHON_ECHO.to_string(),
    };
    let output = run_grader_binary(&["--child"], &serde_json::to_vec(&request).unwrap());

    assert!(
        output.status.success(),
        "child failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    // The entire stdout must be one parsable report, nothing else.
    let report: GradeReport = serde_json::from_slice(&output.stdout).unwrap();
    assert!(report.correct);
    assert_eq!(report.score, 1);
    assert_eq!(report.tests.len(), 2);
}

#[test]
fn child_rejects_a_malformed_request() {
    let output = run_grader_binary(&["--child"], b"this is not a grade request");
    assert!(!output.status.success());
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("Malformed grade request"),
        "unexpected stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[tokio::test]
async fn child_that_dies_before_replying_is_a_hard_failure() {
    // Inside the test harness, current_exe is the harness itself, which does
    // not understand child mode and exits without ever producing a report.
    // The wrapper must surface that as an error, never as an empty report.
    let request = GradeRequest {
        fixture_root: PathBuf::from("/nonexistent"),
        config: GraderConfig {
            problem_name: "echo".to_string(),
            timeout: 1,
            is_staff: false,
            grader: String::new(),
        },
        source: "print(1)".to_string(),
    };
    let result = grade_in_subprocess(&request).await;
    assert!(result.is_err());
}
