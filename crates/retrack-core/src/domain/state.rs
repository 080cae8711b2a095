//! Record and attempt states.

use serde::{Deserialize, Serialize};

/// Record lifecycle state.
///
/// State transitions:
/// - Pending -> Processing (first `start_attempt`)
/// - Processing -> Processing (each further `start_attempt`)
/// - Processing -> Completed | Failed
///
/// Completed and Failed are absorbing for attempts and errors; only another
/// terminal call can move a record between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RecordStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RecordStatus::Completed | RecordStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Processing => "processing",
            RecordStatus::Completed => "completed",
            RecordStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::pending(RecordStatus::Pending, false)]
    #[case::processing(RecordStatus::Processing, false)]
    #[case::completed(RecordStatus::Completed, true)]
    #[case::failed(RecordStatus::Failed, true)]
    fn terminal_states(#[case] status: RecordStatus, #[case] terminal: bool) {
        assert_eq!(status.is_terminal(), terminal);
    }

    #[test]
    fn statuses_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&RecordStatus::Processing).unwrap(),
            "\"processing\""
        );
        assert_eq!(
            serde_json::to_string(&AttemptStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(RecordStatus::Failed.to_string(), "failed");
    }
}
