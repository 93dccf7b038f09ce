use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::compare::compare;
use crate::config::{FixturePaths, GraderConfig};
use crate::detect::{Classifier, Language, detect};
use crate::driver::{self, ArtifactPaths};
use crate::report::{ExecutionResult, GradeReport, TestOutcome};

static ARTIFACT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Label of the user-visible test case.
const SAMPLE_LABEL: &str = "sample";
/// Label of the hidden test case whose outcome determines the score.
const SECRET_LABEL: &str = "staff";

/// Produces a file stem unique across concurrent grader processes.
///
/// Uniqueness of these stems is the sole mechanism preventing concurrent
/// submissions from overwriting each other's artifacts; the pid separates
/// processes and the counter separates submissions within one process.
fn unique_artifact_stem() -> String {
    let seq = ARTIFACT_SEQ.fetch_add(1, Ordering::Relaxed);
    format!(
        "code_{}_{}_{seq}",
        std::process::id(),
        chrono::Utc::now().format("%Y%m%d%H%M%S%3f"),
    )
}

/// Removes a submission's transient artifacts when dropped, so cleanup runs
/// on every exit path of [`grade`].
struct ArtifactGuard {
    paths: Vec<PathBuf>,
}

impl ArtifactGuard {
    fn new(artifacts: &ArtifactPaths) -> Self {
        Self {
            paths: vec![
                artifacts.source.clone(),
                artifacts.class_file.clone(),
                artifacts.binary.clone(),
                artifacts.binary.with_extension("out"),
            ],
        }
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        for path in &self.paths {
            if path.exists() {
                if let Err(e) = fs::remove_file(path) {
                    log::warn!("Failed to remove artifact {}: {e}", path.display());
                }
            }
        }
    }
}

/// One test case's contribution to the final report.
enum CaseResult {
    Graded(TestOutcome),
    Errored(String),
}

/// Grades one submission: detect, materialize, run the sample and secret
/// cases in that order, merge, clean up.
///
/// Expected failures (unsupported language, compile error, timeout, runtime
/// error, unreadable fixtures) are folded into the returned report and never
/// propagate; an `Err` from this function means something genuinely
/// unexpected broke and the whole submission should be failed hard.
pub async fn grade(
    fixture_root: &Path,
    scratch_dir: &Path,
    config: &GraderConfig,
    source: &str,
    classifier: &dyn Classifier,
) -> Result<GradeReport> {
    let stem = unique_artifact_stem();

    let (lang, source) = match detect(classifier, source, &stem)? {
        Ok(detected) => detected,
        Err(failure) => {
            log::info!("Submission rejected before execution: {}", failure.message);
            return Ok(GradeReport::error(failure.message));
        }
    };
    log::info!(
        "Detected {lang} submission for problem {}",
        config.problem_name
    );

    let artifacts = ArtifactPaths::new(scratch_dir, &stem, lang);
    let _guard = ArtifactGuard::new(&artifacts);

    fs::write(&artifacts.source, source.as_bytes()).with_context(|| {
        format!(
            "Failed to write submission source to {}",
            artifacts.source.display()
        )
    })?;

    let fixtures = FixturePaths::new(fixture_root, &config.problem_name);
    let time_limit = Duration::from_secs(config.timeout);

    // Sample first, secret second; the secret case runs regardless of the
    // sample outcome.
    let sample = run_one_case(
        SAMPLE_LABEL,
        lang,
        &artifacts,
        &fixtures.aux_jar,
        &fixtures.sample_in,
        &fixtures.sample_out,
        time_limit,
    )
    .await?;
    let secret = run_one_case(
        SECRET_LABEL,
        lang,
        &artifacts,
        &fixtures.aux_jar,
        &fixtures.secret_in,
        &fixtures.secret_out,
        time_limit,
    )
    .await?;

    Ok(merge_cases(sample, secret))
}

#[allow(clippy::too_many_arguments)]
async fn run_one_case(
    label: &str,
    lang: Language,
    artifacts: &ArtifactPaths,
    aux_jar: &Path,
    input_file: &Path,
    expected_file: &Path,
    time_limit: Duration,
) -> Result<CaseResult> {
    if !input_file.exists() {
        return Ok(CaseResult::Errored(format!(
            "Missing fixture file {}",
            input_file.display()
        )));
    }
    let expected = match fs::read_to_string(expected_file) {
        Ok(text) => text,
        Err(e) => {
            return Ok(CaseResult::Errored(format!(
                "Unreadable fixture file {}: {e}",
                expected_file.display()
            )));
        }
    };

    match driver::run_case(lang, artifacts, aux_jar, input_file, time_limit).await? {
        ExecutionResult::Output(actual) => Ok(CaseResult::Graded(compare(label, &actual, &expected))),
        ExecutionResult::Failure(failure) => {
            log::info!("Case {label} failed: {:?}", failure.kind);
            Ok(CaseResult::Errored(failure.message))
        }
    }
}

/// Assembles the final report. Outcomes are listed sample first, then
/// secret; the top-level verdict comes from the secret case alone. A case
/// that produced no outcome contributes its error message instead.
fn merge_cases(sample: CaseResult, secret: CaseResult) -> GradeReport {
    let mut report = GradeReport {
        correct: false,
        score: 0,
        errors: Vec::new(),
        tests: Vec::new(),
    };

    match sample {
        CaseResult::Graded(outcome) => report.tests.push(outcome),
        CaseResult::Errored(message) => report.errors.push(message),
    }
    match secret {
        CaseResult::Graded(outcome) => {
            report.correct = outcome.correct;
            report.score = outcome.correct as u8;
            report.tests.push(outcome);
        }
        CaseResult::Errored(message) => report.errors.push(message),
    }

    report
}
