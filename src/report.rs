use serde::{Deserialize, Serialize};

/// Category of an expected grading failure.
///
/// These are the failures a submission can legitimately cause; each one is
/// translated into an entry in the report's error list rather than propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    UnsupportedLanguage,
    CompileError,
    TimeLimitExceeded,
    RuntimeError,
    Configuration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Outcome of running a submission once against one test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The program ran to completion without writing to stderr
    Output(String),
    Failure(Failure),
}

/// Result of comparing one run's output against the expected output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub label: String,
    pub correct: bool,
    pub expected: String,
    pub actual: String,
}

/// The structured reply for one submission.
///
/// `correct` and `score` reflect the secret test case only; the sample case
/// appears in `tests` for student feedback but never grants credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeReport {
    pub correct: bool,
    pub score: u8,
    pub errors: Vec<String>,
    pub tests: Vec<TestOutcome>,
}

impl GradeReport {
    /// A report for a submission that failed before producing any test outcome.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            correct: false,
            score: 0,
            errors: vec![message.into()],
            tests: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_report_has_no_tests_and_no_credit() {
        let report = GradeReport::error("Language can only be C++, Java or Python.");
        assert!(!report.correct);
        assert_eq!(report.score, 0);
        assert_eq!(report.tests.len(), 0);
        assert_eq!(
            report.errors,
            vec!["Language can only be C++, Java or Python.".to_string()]
        );
    }

    #[test]
    fn report_serializes_with_expected_field_names() {
        let report = GradeReport {
            correct: true,
            score: 1,
            errors: vec![],
            tests: vec![TestOutcome {
                label: "sample".to_string(),
                correct: true,
                expected: "5".to_string(),
                actual: "5".to_string(),
            }],
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["score"], 1);
        assert_eq!(value["tests"][0]["label"], "sample");
    }
}
