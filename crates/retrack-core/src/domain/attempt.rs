//! Attempt and recovery history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ErrorEntry;
use super::state::AttemptStatus;

/// One discrete try at processing a record.
///
/// `errors` is the attempt-scoped subset of the record's errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// Number as declared by the caller of `start_attempt`.
    pub number: u32,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: AttemptStatus,
    pub errors: Vec<ErrorEntry>,
    pub recovery_attempts: Vec<RecoveryAttempt>,
}

impl Attempt {
    pub fn new(number: u32, start_time: DateTime<Utc>) -> Self {
        Self {
            number,
            start_time,
            end_time: None,
            status: AttemptStatus::InProgress,
            errors: Vec::new(),
            recovery_attempts: Vec::new(),
        }
    }

    /// Close the attempt with a final status.
    pub fn finish(&mut self, status: AttemptStatus, at: DateTime<Utc>) {
        self.status = status;
        self.end_time = Some(at);
    }
}

/// A crash-recovery procedure run during an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    /// Caller-supplied recovery type (e.g. "browser_restart").
    pub kind: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub details: serde_json::Value,
}

impl RecoveryAttempt {
    pub fn new(
        kind: impl Into<String>,
        success: bool,
        details: Option<serde_json::Value>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: kind.into(),
            success,
            timestamp,
            details: details.unwrap_or_else(|| serde_json::json!({})),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn new_attempt_is_in_progress() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let attempt = Attempt::new(1, at);

        assert_eq!(attempt.status, AttemptStatus::InProgress);
        assert!(attempt.end_time.is_none());
        assert!(attempt.errors.is_empty());
        assert!(attempt.recovery_attempts.is_empty());
    }

    #[test]
    fn finish_sets_status_and_end_time() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut attempt = Attempt::new(1, at);

        attempt.finish(AttemptStatus::Failed, at + Duration::seconds(5));

        assert_eq!(attempt.status, AttemptStatus::Failed);
        assert_eq!(attempt.end_time, Some(at + Duration::seconds(5)));
    }
}
