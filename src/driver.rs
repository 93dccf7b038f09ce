use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::Command;
use tokio::time::timeout;

use crate::detect::Language;
use crate::report::{ExecutionResult, Failure, FailureKind};

/// Fixed user-facing message for a forcibly terminated run.
pub const TIME_LIMIT_MESSAGE: &str = "Time limit exceeded.";

/// Wall clock granted to the compile step. The run step uses the
/// caller-supplied budget; compilation gets this fixed one so a pathological
/// submission cannot stall the grader before execution even starts.
pub const COMPILE_TIME_LIMIT: Duration = Duration::from_secs(30);

/// On-disk locations for one submission's transient artifacts.
///
/// All names share a per-submission unique stem, which is the only thing
/// keeping concurrent graders from trampling each other's files.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    /// The materialized source file, extension matching the language
    pub source: PathBuf,
    /// Compiled C++ binary (the stem with no extension)
    pub binary: PathBuf,
    /// `javac` class file output
    pub class_file: PathBuf,
    /// Directory the artifacts live in; doubles as the Java classpath root
    pub work_dir: PathBuf,
    /// Bare class name Java submissions are rewritten to
    pub class_name: String,
}

impl ArtifactPaths {
    pub fn new(work_dir: &Path, stem: &str, lang: Language) -> Self {
        Self {
            source: work_dir.join(format!("{stem}.{}", lang.extension())),
            binary: work_dir.join(stem),
            class_file: work_dir.join(format!("{stem}.class")),
            work_dir: work_dir.to_path_buf(),
            class_name: stem.to_string(),
        }
    }
}

/// Compiles (when the language needs it) and runs the submission once
/// against `input_file`, under `time_limit` for the run step.
///
/// The input fixture is handed to the program as a command-line argument,
/// not piped to stdin; that is the fixture convention every supported
/// language follows.
pub async fn run_case(
    lang: Language,
    paths: &ArtifactPaths,
    aux_jar: &Path,
    input_file: &Path,
    time_limit: Duration,
) -> Result<ExecutionResult> {
    if let Some(failure) = compile(lang, paths, aux_jar).await? {
        return Ok(ExecutionResult::Failure(failure));
    }
    execute(lang, paths, aux_jar, input_file, time_limit).await
}

/// Runs the compiler for compiled languages. Any diagnostic text on stderr
/// is a compile failure regardless of the compiler's exit status, so that
/// warnings-as-errors style submissions fail closed.
async fn compile(lang: Language, paths: &ArtifactPaths, aux_jar: &Path) -> Result<Option<Failure>> {
    let cmd = match lang {
        Language::Python => return Ok(None),
        Language::Java => {
            let mut cmd = Command::new("javac");
            cmd.arg("-cp").arg(aux_jar).arg(&paths.source);
            cmd
        }
        Language::Cpp => {
            let mut cmd = Command::new("g++");
            cmd.arg(&paths.source).arg("-o").arg(&paths.binary);
            cmd
        }
    };

    let output = match wait_with_deadline(cmd, COMPILE_TIME_LIMIT, &format!("{lang} compiler")).await?
    {
        Some(output) => output,
        None => {
            log::warn!("{lang} compilation exceeded {COMPILE_TIME_LIMIT:?}, killed");
            return Ok(Some(Failure::new(
                FailureKind::CompileError,
                "Compilation timed out.",
            )));
        }
    };

    let diagnostics = String::from_utf8_lossy(&output.stderr);
    if !diagnostics.trim().is_empty() {
        return Ok(Some(Failure::new(
            FailureKind::CompileError,
            diagnostics.into_owned(),
        )));
    }

    Ok(None)
}

/// Runs the compiled or interpreted program against one input fixture.
///
/// Any stderr text is a runtime failure even on exit status 0: student
/// programs routinely exit cleanly while still printing diagnostics that
/// indicate a bug, and the grading contract has zero tolerance for that.
async fn execute(
    lang: Language,
    paths: &ArtifactPaths,
    aux_jar: &Path,
    input_file: &Path,
    time_limit: Duration,
) -> Result<ExecutionResult> {
    let mut cmd = match lang {
        Language::Python => {
            let mut cmd = Command::new("python3");
            cmd.arg(&paths.source);
            cmd
        }
        Language::Java => {
            let classpath = format!("{}:{}", paths.work_dir.display(), aux_jar.display());
            let mut cmd = Command::new("java");
            cmd.arg("-cp").arg(classpath).arg(&paths.class_name);
            cmd
        }
        Language::Cpp => Command::new(&paths.binary),
    };
    cmd.arg(input_file);

    match wait_with_deadline(cmd, time_limit, &format!("{lang} program")).await? {
        Some(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                return Ok(ExecutionResult::Failure(Failure::new(
                    FailureKind::RuntimeError,
                    stderr.into_owned(),
                )));
            }
            Ok(ExecutionResult::Output(
                String::from_utf8_lossy(&output.stdout).into_owned(),
            ))
        }
        None => {
            log::info!("Run killed after exceeding {time_limit:?}");
            Ok(ExecutionResult::Failure(Failure::new(
                FailureKind::TimeLimitExceeded,
                TIME_LIMIT_MESSAGE,
            )))
        }
    }
}

/// Runs `cmd` to completion under `limit`, capturing stdout and stderr.
/// Returns `None` on timeout, after forcibly killing the child's whole
/// process group: a submission may have spawned descendants of its own, and
/// none of them may outlive the grading of that submission.
async fn wait_with_deadline(
    mut cmd: Command,
    limit: Duration,
    desc: &str,
) -> Result<Option<Output>> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // The child leads its own process group, so the timeout kill below
    // reaches every process the submission spawned.
    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn {desc}"))?;
    let pgid = child.id();

    match timeout(limit, child.wait_with_output()).await {
        Ok(result) => {
            let output = result.with_context(|| format!("Failed to collect {desc} output"))?;
            Ok(Some(output))
        }
        Err(_) => {
            // Dropping the timed-out future reaps the direct child; the
            // group kill takes out its descendants.
            kill_process_group(pgid);
            Ok(None)
        }
    }
}

/// SIGKILLs an entire process group. The group id equals the child's pid
/// because the child was spawned as its group leader; the group outlives the
/// leader as long as any descendant is still in it.
fn kill_process_group(pgid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pgid) = pgid {
        unsafe {
            libc::kill(-(pgid as i32), libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    let _ = pgid;
}
