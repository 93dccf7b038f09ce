use std::fs;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use clap::Parser;
use serde::{Deserialize, Serialize};

/// Name of the auxiliary library placed next to the fixtures; Java
/// submissions are compiled and run with it on the classpath.
pub const AUX_JAR_NAME: &str = "json-simple-1.1.1.jar";

#[derive(Parser)]
#[command(name = "codegrader", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Root directory holding the per-problem fixture files
    #[arg(long = "fixture-root", short = 'r', required_unless_present = "child")]
    pub fixture_root: Option<PathBuf>,

    /// Path to the submission envelope; read from stdin when omitted
    #[arg(long = "payload", short = 'p')]
    pub payload_path: Option<PathBuf>,

    /// Grade in this process instead of a disposable child process
    #[arg(long = "no-fork", default_value_t = false)]
    pub no_fork: bool,

    /// Run as the grading child: read one request from stdin, write one report
    #[arg(long = "child", hide = true, default_value_t = false)]
    pub child: bool,
}

/// Per-submission grading parameters, supplied by the caller inside the
/// submission envelope. Read-only within the grading core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraderConfig {
    pub problem_name: String,
    /// Wall-clock budget for each run step, in seconds
    pub timeout: u64,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub grader: String,
}

/// On-disk locations of one problem's fixture pair plus the auxiliary jar.
///
/// The layout is `<root>/<problem>-sample.in/.out` for the user-visible case
/// and `<root>/<problem>.in/.out` for the hidden one.
#[derive(Debug, Clone)]
pub struct FixturePaths {
    pub sample_in: PathBuf,
    pub sample_out: PathBuf,
    pub secret_in: PathBuf,
    pub secret_out: PathBuf,
    pub aux_jar: PathBuf,
}

impl FixturePaths {
    pub fn new(fixture_root: &Path, problem_name: &str) -> Self {
        Self {
            sample_in: fixture_root.join(format!("{problem_name}-sample.in")),
            sample_out: fixture_root.join(format!("{problem_name}-sample.out")),
            secret_in: fixture_root.join(format!("{problem_name}.in")),
            secret_out: fixture_root.join(format!("{problem_name}.out")),
            aux_jar: fixture_root.join(AUX_JAR_NAME),
        }
    }
}

/// Resolves the scratch directory used for transient submission artifacts.
///
/// Artifacts only live there between materialization and cleanup; uniqueness
/// of the per-submission file stems keeps concurrent graders from colliding.
pub fn scratch_root() -> anyhow::Result<PathBuf> {
    use directories::ProjectDirs;

    let proj_dirs = ProjectDirs::from("", "", "codegrader")
        .ok_or_else(|| anyhow!("Unable to find user directory"))?;

    let scratch_dir = proj_dirs.cache_dir().join("scratch");
    fs::create_dir_all(&scratch_dir)?;

    Ok(scratch_dir)
}
