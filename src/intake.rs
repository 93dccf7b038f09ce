use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::GraderConfig;

/// Outer envelope as delivered by the upstream queue. The body and the
/// grader payload are JSON documents nested as strings, so parsing happens
/// in three layers. Other envelope fields (attached files and the like) are
/// not consumed by the grading core and are ignored.
#[derive(Debug, Deserialize)]
struct Envelope {
    xqueue_body: String,
}

#[derive(Debug, Deserialize)]
struct EnvelopeBody {
    student_response: String,
    grader_payload: String,
    student_info: String,
}

#[derive(Debug, Deserialize)]
struct StudentInfo {
    #[serde(default)]
    is_staff: bool,
}

/// One submission, ready for grading.
#[derive(Debug)]
pub struct Submission {
    pub source: String,
    pub config: GraderConfig,
}

/// Unpacks a raw submission envelope into source text and grading
/// parameters. A malformed envelope or payload is a configuration fault of
/// the caller and is surfaced, not retried.
pub fn parse_envelope(raw: &str) -> Result<Submission> {
    let envelope: Envelope =
        serde_json::from_str(raw).context("Malformed submission envelope")?;
    let body: EnvelopeBody =
        serde_json::from_str(&envelope.xqueue_body).context("Malformed xqueue body")?;
    let mut config: GraderConfig =
        serde_json::from_str(&body.grader_payload).context("Malformed grader payload")?;
    let info: StudentInfo =
        serde_json::from_str(&body.student_info).context("Malformed student info")?;

    config.is_staff = info.is_staff;
    log::debug!(
        "Parsed submission for problem {} (staff: {})",
        config.problem_name,
        config.is_staff
    );

    Ok(Submission {
        source: body.student_response,
        config,
    })
}
