//! Tracker: record lifecycle, retry eligibility and bounded-memory cleanup.

mod correlation;
mod memory;

pub use memory::InMemoryTracker;

use async_trait::async_trait;

use crate::domain::{
    CleanupReport, Decision, ErrorEntry, ErrorReport, FailedRecordSummary, JobId, RecordExport,
    RecordId, RecordState, RecordStats, RecoveryAttempt, SessionId, SessionStats,
};
use crate::error::TrackerError;

/// Tracker port.
///
/// The orchestrator drives each record through
/// `initialize -> {start_attempt, record_error, record_recovery_attempt}* -> mark_*`
/// and asks `should_retry_record` before every retry. The reporting layer only
/// reads. Every returned value is an owned snapshot.
///
/// Mutations on an unknown id fail with `RecordNotFound` and change nothing;
/// aggregate reads return `None` or an empty list instead.
#[async_trait]
pub trait RecordTracker: Send + Sync {
    /// Create (or replace) the state for `id` with status Pending.
    async fn initialize(
        &self,
        id: RecordId,
        payload: serde_json::Value,
        session_id: SessionId,
        job_id: JobId,
    ) -> Result<RecordState, TrackerError>;

    async fn start_attempt(&self, id: &RecordId, number: u32) -> Result<(), TrackerError>;

    /// Store a processing error on the record, its current attempt and the
    /// correlation index.
    async fn record_error(
        &self,
        id: &RecordId,
        error: ErrorReport,
        context: Option<serde_json::Value>,
    ) -> Result<ErrorEntry, TrackerError>;

    async fn record_recovery_attempt(
        &self,
        id: &RecordId,
        kind: &str,
        success: bool,
        details: Option<serde_json::Value>,
    ) -> Result<RecoveryAttempt, TrackerError>;

    async fn mark_processed(
        &self,
        id: &RecordId,
        result: Option<serde_json::Value>,
    ) -> Result<(), TrackerError>;

    async fn mark_failed(
        &self,
        id: &RecordId,
        reason: Option<String>,
        recoverable: bool,
    ) -> Result<(), TrackerError>;

    /// Attempt-count and recoverability gate, with its reason.
    async fn continue_decision(&self, id: &RecordId) -> Decision;

    /// Retry gate, with its reason.
    async fn retry_decision(&self, id: &RecordId) -> Decision;

    async fn should_continue_processing(&self, id: &RecordId) -> bool {
        self.continue_decision(id).await.is_proceed()
    }

    async fn should_retry_record(&self, id: &RecordId) -> bool {
        self.retry_decision(id).await.is_proceed()
    }

    async fn get_record_stats(&self, id: &RecordId) -> Option<RecordStats>;

    async fn get_session_stats(&self, session_id: &SessionId) -> Option<SessionStats>;

    /// Records awaiting manual review, oldest failure first.
    async fn get_failed_records(&self) -> Vec<FailedRecordSummary>;

    /// Purge records whose `last_updated` is at or before `now - max_age_hours`.
    async fn cleanup(&self, max_age_hours: u64) -> CleanupReport;

    async fn get_error_correlation(&self, id: &RecordId, kind: &str) -> Vec<ErrorEntry>;

    async fn export_record_state(&self, id: &RecordId) -> Option<RecordExport>;

    /// Number of records currently held.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
