//! Structured Feedback Module
//!
//! Machine-readable summary of a batch run, written as JSON with `--report`.

use serde::{Deserialize, Serialize};

use crate::driver::{BatchResults, UnitOutcome};
use crate::utils::Error;

/// One diagnostic for a failed unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Error code (e.g., "E0100")
    pub code: String,

    /// Human-readable message
    pub message: String,

    /// Source line, when the error has one
    pub line: Option<usize>,

    /// Offending token or line text
    pub text: Option<String>,
}

impl Diagnostic {
    pub fn from_error(error: &Error) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
            line: error.line(),
            text: error.offending_text().map(str::to_string),
        }
    }
}

/// Report entry for one compilation unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitReport {
    pub file: String,
    pub success: bool,
    pub token_count: usize,
    pub error: Option<Diagnostic>,
}

impl UnitReport {
    pub fn from_outcome(outcome: &UnitOutcome) -> Self {
        let (token_count, error) = match &outcome.result {
            Ok(summary) => (summary.token_count, None),
            Err(err) => (0, Some(Diagnostic::from_error(err))),
        };
        Self {
            file: outcome.path.display().to_string(),
            success: outcome.is_success(),
            token_count,
            error,
        }
    }
}

/// Complete run report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub units: Vec<UnitReport>,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn from_results(results: &BatchResults) -> Self {
        Self {
            units: results.outcomes.iter().map(UnitReport::from_outcome).collect(),
            succeeded: results.success_count(),
            failed: results.failure_count(),
            duration_ms: results.duration.as_millis() as u64,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::UnitSummary;
    use crate::frontend::token::TokenKind;
    use std::path::PathBuf;
    use std::time::Duration;

    fn sample_results() -> BatchResults {
        BatchResults {
            outcomes: vec![
                UnitOutcome {
                    path: PathBuf::from("Main.jack"),
                    result: Ok(UnitSummary {
                        token_count: 13,
                        outputs: vec![],
                    }),
                },
                UnitOutcome {
                    path: PathBuf::from("Bad.jack"),
                    result: Err(Error::UnexpectedToken {
                        expected: "identifier".to_string(),
                        got: TokenKind::IntegerConstant,
                        text: "1".to_string(),
                        line: 1,
                    }),
                },
            ],
            duration: Duration::from_millis(42),
        }
    }

    #[test]
    fn test_report_counts() {
        let report = RunReport::from_results(&sample_results());
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.duration_ms, 42);
        assert_eq!(report.units[0].token_count, 13);
        assert!(report.units[0].error.is_none());

        let diagnostic = report.units[1].error.as_ref().unwrap();
        assert_eq!(diagnostic.code, "E0100");
        assert_eq!(diagnostic.line, Some(1));
        assert_eq!(diagnostic.text.as_deref(), Some("1"));
    }

    #[test]
    fn test_report_json_shape() {
        let json = RunReport::from_results(&sample_results()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["succeeded"], 1);
        assert_eq!(value["units"][0]["file"], "Main.jack");
        assert_eq!(value["units"][0]["error"], serde_json::Value::Null);
        assert_eq!(
            value["units"][1]["error"]["message"],
            "expected identifier, got integerConstant '1'"
        );

        let parsed: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.units.len(), 2);
    }
}
