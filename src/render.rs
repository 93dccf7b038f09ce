//! Turns a [`GradeReport`] into the HTML fragment shown to the student.
//!
//! All functions here are pure; there is no shared template state.

use crate::report::{GradeReport, TestOutcome};

/// Renders the full result block: status line, error list, per-test panels.
pub fn render_report(report: &GradeReport) -> String {
    let errors = format_errors(&report.errors);

    let status = if !errors.is_empty() {
        "ERROR"
    } else if report.correct {
        "CORRECT"
    } else {
        "INCORRECT"
    };

    let results: String = report.tests.iter().map(render_outcome).collect();

    format!(
        r#"<div class="test">
<header>Test results</header>
  <section>
    <div class="shortform">
    {status}
    </div>
    <div class="longform">
      {errors}
      {results}
    </div>
  </section>
</div>
"#
    )
}

/// Renders the error list, or an empty string when there are no errors.
pub fn format_errors(errors: &[String]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let items: String = errors
        .iter()
        .map(|e| format!("<li><pre>{}</pre></li>\n", escape_html(e)))
        .collect();
    format!(r#"<div class="result-errors"><ul>{items}</ul></div>"#)
}

fn render_outcome(outcome: &TestOutcome) -> String {
    let class = if outcome.correct {
        "result-correct"
    } else {
        "result-incorrect"
    };
    let expected_heading = if outcome.correct {
        "Expected Output:"
    } else {
        "Correct Output:"
    };
    let actual = display_text(&outcome.actual);
    let expected = display_text(&outcome.expected);
    let label = escape_html(&outcome.label);

    format!(
        r#"<div class="result-output {class}">
  <h4>{label}</h4>
  <div class="result-column">
    <dt>Program Output:</dt>
    <dl><dd class="result-actual-output"><pre>{actual}</pre></dd></dl>
  </div>
  <div class="result-column">
    <dt>{expected_heading}</dt>
    <dl><dd><pre>{expected}</pre></dd></dl>
  </div>
</div>
"#
    )
}

/// Escapes text for HTML and makes whitespace visible the way the report
/// panels expect: spaces become `&nbsp;`, newlines become `<br />`.
fn display_text(text: &str) -> String {
    escape_html(text).replace(' ', "&nbsp;").replace('\n', "<br />")
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
