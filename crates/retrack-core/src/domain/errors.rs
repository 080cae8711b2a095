//! Recorded processing errors.
//!
//! These are data, not control flow: the orchestrator classifies a failure of
//! the external workflow and hands it over as an [`ErrorReport`]. The tracker
//! stores it as an [`ErrorEntry`] and later reads the `recoverable` flag when
//! deciding whether a retry is allowed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A failure reported by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub message: String,

    /// Caller-supplied classification (e.g. "network", "browser_crash").
    pub kind: String,

    /// `None` is treated as recoverable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recoverable: Option<bool>,

    /// Diagnostic trace (stack, page dump, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl ErrorReport {
    pub fn new(message: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: kind.into(),
            recoverable: None,
            trace: None,
        }
    }

    pub fn recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = Some(recoverable);
        self
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Only an explicit `false` makes an error unrecoverable.
    pub fn is_recoverable(&self) -> bool {
        self.recoverable != Some(false)
    }
}

/// An error as stored on the record, its attempt and the correlation index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub message: String,
    pub kind: String,
    pub context: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    pub recoverable: bool,

    /// `current_attempt` at the time of recording (0 before any attempt).
    pub attempt_number: u32,
}

impl ErrorEntry {
    pub fn from_report(
        report: ErrorReport,
        context: Option<serde_json::Value>,
        attempt_number: u32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let recoverable = report.is_recoverable();
        Self {
            message: report.message,
            kind: report.kind,
            context: context.unwrap_or_else(|| serde_json::json!({})),
            timestamp,
            trace: report.trace,
            recoverable,
            attempt_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case::unset(None, true)]
    #[case::explicit_true(Some(true), true)]
    #[case::explicit_false(Some(false), false)]
    fn recoverable_defaults_to_true(#[case] flag: Option<bool>, #[case] expected: bool) {
        let mut report = ErrorReport::new("timeout", "network");
        report.recoverable = flag;
        assert_eq!(report.is_recoverable(), expected);
    }

    #[test]
    fn entry_copies_report_fields() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let report = ErrorReport::new("page crashed", "browser_crash")
            .recoverable(false)
            .with_trace("at submit()");

        let entry = ErrorEntry::from_report(report, None, 2, at);

        assert_eq!(entry.message, "page crashed");
        assert_eq!(entry.kind, "browser_crash");
        assert!(!entry.recoverable);
        assert_eq!(entry.attempt_number, 2);
        assert_eq!(entry.trace.as_deref(), Some("at submit()"));
        assert_eq!(entry.context, serde_json::json!({}));
        assert_eq!(entry.timestamp, at);
    }

    #[test]
    fn report_deserializes_without_optional_fields() {
        let report: ErrorReport =
            serde_json::from_str(r#"{"message":"timeout","kind":"network"}"#).unwrap();
        assert!(report.is_recoverable());
        assert!(report.trace.is_none());
    }
}
