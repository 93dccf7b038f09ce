use crate::report::TestOutcome;

/// Compares a run's captured stdout against the expected fixture text.
///
/// Both texts are stripped of leading and trailing whitespace as a whole
/// (never per line), then split on `'\n'`; the verdict is exact sequence
/// equality of the resulting line lists. No tolerance for trailing spaces
/// inside a line, no numeric tolerance, no reordering.
pub fn compare(label: &str, actual: &str, expected: &str) -> TestOutcome {
    let actual = actual.trim();
    let expected = expected.trim();

    let correct = actual.split('\n').eq(expected.split('\n'));

    TestOutcome {
        label: label.to_string(),
        correct,
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}
