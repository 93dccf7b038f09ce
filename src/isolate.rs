use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::config::{self, GraderConfig};
use crate::detect::Classifier;
use crate::grader;
use crate::report::GradeReport;

/// Everything the grading child needs for one submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct GradeRequest {
    pub fixture_root: PathBuf,
    pub config: GraderConfig,
    pub source: String,
}

/// Grades one submission in a freshly spawned child process.
///
/// The current executable is re-invoked in child mode; the request travels
/// over the child's stdin and exactly one JSON report comes back over its
/// stdout. The parent blocks until the child terminates. A submission that
/// corrupts interpreter state, exhausts memory, or hangs past its own
/// timeout is confined to the disposable child; the long-lived caller never
/// shares state with untrusted execution.
///
/// If the child died before producing a report, the failure is propagated to
/// the caller with the child's stderr attached, never an empty report.
pub async fn grade_in_subprocess(request: &GradeRequest) -> Result<GradeReport> {
    let exe = std::env::current_exe().context("Failed to locate the grader executable")?;
    let payload = serde_json::to_vec(request)?;

    let mut child = Command::new(&exe)
        .arg("--child")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .context("Failed to spawn grading child process")?;

    {
        let mut stdin = child
            .stdin
            .take()
            .context("Grading child has no stdin handle")?;
        stdin.write_all(&payload).await?;
        // Close the pipe so the child sees end-of-input.
        stdin.shutdown().await?;
    }

    let output = child
        .wait_with_output()
        .await
        .context("Failed to collect grading child output")?;

    if !output.status.success() {
        bail!(
            "Grading child exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    serde_json::from_slice(&output.stdout).with_context(|| {
        format!(
            "Grading child produced no parsable report: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )
    })
}

/// Child-mode entry point: reads one [`GradeRequest`] from stdin, grades it,
/// and writes the report as a single JSON document to stdout.
pub async fn run_child(classifier: &dyn Classifier) -> Result<()> {
    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .context("Failed to read grade request from stdin")?;
    let request: GradeRequest =
        serde_json::from_str(&raw).context("Malformed grade request payload")?;

    let scratch_dir = config::scratch_root()?;
    let report = grader::grade(
        &request.fixture_root,
        &scratch_dir,
        &request.config,
        &request.source,
        classifier,
    )
    .await?;

    // Stdout is the reply channel; logs go to stderr via env_logger.
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_request_carries_config_through_json() {
        let request = GradeRequest {
            fixture_root: PathBuf::from("/data/fixtures"),
            config: GraderConfig {
                problem_name: "aplusb".to_string(),
                timeout: 5,
                is_staff: false,
                grader: String::new(),
            },
            source: "print(1)".to_string(),
        };
        let parsed: GradeRequest =
            serde_json::from_str(&serde_json::to_string(&request).unwrap()).unwrap();
        assert_eq!(parsed.config.problem_name, "aplusb");
        assert_eq!(parsed.config.timeout, 5);
        assert_eq!(parsed.source, "print(1)");
    }
}
