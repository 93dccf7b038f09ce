use std::io::Read;
use std::time::Instant;

use clap::Parser;

use codegrader::config::{CliArgs, scratch_root};
use codegrader::detect::HeuristicClassifier;
use codegrader::intake;
use codegrader::isolate::{self, GradeRequest};
use codegrader::render;
use codegrader::{grader, report::GradeReport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let classifier = HeuristicClassifier;

    if cli.child {
        return isolate::run_child(&classifier).await;
    }

    let fixture_root = cli
        .fixture_root
        .clone()
        .expect("--fixture-root is required");

    let raw = match &cli.payload_path {
        Some(path) => std::fs::read_to_string(path).expect("Failed to read payload file"),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .expect("Failed to read payload from stdin");
            buffer
        }
    };

    let submission = intake::parse_envelope(&raw)?;
    let request = GradeRequest {
        fixture_root,
        config: submission.config,
        source: submission.source,
    };

    let start = Instant::now();
    let report: GradeReport = if cli.no_fork {
        let scratch_dir = scratch_root()?;
        grader::grade(
            &request.fixture_root,
            &scratch_dir,
            &request.config,
            &request.source,
            &classifier,
        )
        .await?
    } else {
        isolate::grade_in_subprocess(&request).await?
    };
    log::info!(
        "Graded problem {} in {:?}",
        request.config.problem_name,
        start.elapsed()
    );

    let reply = serde_json::json!({
        "correct": report.correct,
        "score": report.score,
        "msg": render::render_report(&report),
    });
    println!("{}", serde_json::to_string(&reply)?);

    Ok(())
}
