//! Serializable views for the reporting layer.
//!
//! Every view is an owned snapshot; nothing here borrows tracker state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ErrorEntry;
use super::ids::{RecordId, SessionId};
use super::record::{FailedRecord, RecordState};
use super::state::RecordStatus;

/// Per-record summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordStats {
    pub record_id: RecordId,
    pub status: RecordStatus,
    pub attempts: usize,
    pub errors: usize,
    pub recovery_attempts: usize,
    pub is_processed: bool,
    pub recoverable: bool,
    pub processing_time_ms: i64,
}

impl RecordStats {
    pub fn from_record(record: &RecordState, now: DateTime<Utc>) -> Self {
        Self {
            record_id: record.id.clone(),
            status: record.status,
            attempts: record.attempts.len(),
            errors: record.errors.len(),
            recovery_attempts: record.total_recovery_attempts(),
            is_processed: record.is_processed,
            recoverable: record.recoverable,
            processing_time_ms: record.elapsed(now).num_milliseconds(),
        }
    }
}

/// Aggregate over all records of a session.
///
/// The four status counters always sum to `total_records`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: Option<SessionId>,
    pub total_records: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub total_errors: usize,
    pub total_recovery_attempts: usize,
}

impl SessionStats {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id: Some(session_id),
            ..Self::default()
        }
    }

    pub fn add(&mut self, record: &RecordState) {
        self.total_records += 1;
        match record.status {
            RecordStatus::Pending => self.pending += 1,
            RecordStatus::Processing => self.processing += 1,
            RecordStatus::Completed => self.completed += 1,
            RecordStatus::Failed => self.failed += 1,
        }
        self.total_errors += record.errors.len();
        self.total_recovery_attempts += record.total_recovery_attempts();
    }
}

/// Entry of the manual-review list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRecordSummary {
    pub record_id: RecordId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub failed_at: DateTime<Utc>,
    pub recoverable: bool,
    pub attempts: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ErrorEntry>,
}

impl FailedRecordSummary {
    pub fn new(failed: &FailedRecord, record: &RecordState, display_field: &str) -> Self {
        Self {
            record_id: failed.record_id.clone(),
            display_name: record.display_name(display_field),
            reason: failed.reason.clone(),
            failed_at: failed.failed_at,
            recoverable: failed.recoverable,
            attempts: record.attempts.len(),
            last_error: record.last_error().cloned(),
        }
    }
}

/// Full diagnostic dump of one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordExport {
    pub record: RecordState,
    pub stats: RecordStats,
    pub exported_at: DateTime<Utc>,
}

/// What a cleanup pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub records_removed: usize,
    pub sessions_removed: usize,
    pub failed_removed: usize,
    pub correlation_entries_removed: usize,
    pub correlation_keys_removed: usize,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::JobId;
    use chrono::{Duration, TimeZone};

    fn make_record(id: &str) -> RecordState {
        RecordState::new(
            RecordId::new(id),
            serde_json::json!({"name": id.to_uppercase()}),
            SessionId::new("s1"),
            JobId::new("j1"),
            3,
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn record_stats_count_history() {
        let mut record = make_record("r1");
        let at = record.start_time;
        record.start_attempt(1, at);
        record.start_attempt(2, at);

        let stats = RecordStats::from_record(&record, at + Duration::seconds(3));
        assert_eq!(stats.status, RecordStatus::Processing);
        assert_eq!(stats.attempts, 2);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.processing_time_ms, 3000);
    }

    #[test]
    fn session_counters_sum_to_total() {
        let mut stats = SessionStats::new(SessionId::new("s1"));
        let pending = make_record("a");
        let mut done = make_record("b");
        let mut failed = make_record("c");
        let at = done.start_time;
        done.mark_processed(None, at);
        failed.mark_failed(None, false, at);

        for record in [&pending, &done, &failed] {
            stats.add(record);
        }

        assert_eq!(stats.total_records, 3);
        assert_eq!(
            stats.pending + stats.processing + stats.completed + stats.failed,
            stats.total_records
        );
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn cleanup_report_empty_by_default() {
        assert!(CleanupReport::default().is_empty());
        let report = CleanupReport {
            records_removed: 1,
            ..CleanupReport::default()
        };
        assert!(!report.is_empty());
    }
}
