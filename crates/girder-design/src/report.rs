//! Plain-text rendering of verification results.

use std::fmt::Write as _;

use crate::verify::{Outcome, VerificationResult};

/// Render an audit report.
///
/// One line per identity plus a summary tail, residuals to three decimals
/// (millimeter precision is noise at the tolerances involved).
pub fn render_text(results: &[VerificationResult]) -> String {
    let mut out = String::new();
    let label_width = results
        .iter()
        .map(|r| r.label.chars().count())
        .max()
        .unwrap_or(0);

    let mut passed = 0usize;
    let mut failed = 0usize;
    let mut errored = 0usize;

    for result in results {
        let _ = write!(out, "{:<label_width$}  ", result.label);
        match &result.outcome {
            Outcome::Pass {
                actual,
                expected,
                residual,
            } => {
                passed += 1;
                let _ = writeln!(
                    out,
                    "PASS  actual={actual:.3} expected={expected:.3} residual={residual:.3} (tolerance {})",
                    result.tolerance
                );
            }
            Outcome::Fail {
                actual,
                expected,
                residual,
            } => {
                failed += 1;
                let _ = writeln!(
                    out,
                    "FAIL  actual={actual:.3} expected={expected:.3} residual={residual:.3} (tolerance {})",
                    result.tolerance
                );
            }
            Outcome::Error { error } => {
                errored += 1;
                let _ = writeln!(out, "ERROR {error}");
            }
        }
    }

    let _ = writeln!(
        out,
        "\n{} checked: {passed} passed, {failed} failed, {errored} errored",
        results.len()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::VerifyError;

    #[test]
    fn report_lines_and_summary() {
        let results = vec![
            VerificationResult {
                label: "deck level".to_string(),
                tolerance: 0.5,
                outcome: Outcome::Pass {
                    actual: 101.6,
                    expected: 101.525,
                    residual: 0.075,
                },
            },
            VerificationResult {
                label: "pier base".to_string(),
                tolerance: 0.5,
                outcome: Outcome::Error {
                    error: VerifyError::UnresolvedFormula {
                        coord: "\"STABILITY CHECK FOR PIER\"!E21".to_string(),
                    },
                },
            },
        ];

        let text = render_text(&results);
        assert!(text.contains("PASS  actual=101.600 expected=101.525 residual=0.075"));
        assert!(text.contains("ERROR"));
        assert!(text.contains("2 checked: 1 passed, 0 failed, 1 errored"));
    }
}
