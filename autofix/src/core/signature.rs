//! Failure-signature detection on raw test output.

use std::sync::LazyLock;

use regex::Regex;

static FAILURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)error|fail").expect("valid failure regex"));

/// Whether `output` looks like a failing test run.
///
/// Matches the case-insensitive substrings `error` or `fail` anywhere in the
/// text. Empty output is clean.
pub fn contains_errors(output: &str) -> bool {
    FAILURE_RE.is_match(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_failure_markers_case_insensitively() {
        assert!(contains_errors("FAIL tests/main.test.js"));
        assert!(contains_errors("AssertionError: expected 2 to equal 3"));
        assert!(contains_errors("1 failing"));
        assert!(contains_errors("TypeError"));
    }

    #[test]
    fn clean_output_has_no_failures() {
        assert!(!contains_errors("5 passing"));
        assert!(!contains_errors(""));
        assert!(!contains_errors("Tests: 12 passed, 12 total"));
    }
}
