//! In-memory tracker implementation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::RecordTracker;
use super::correlation::CorrelationIndex;
use crate::config::{AttemptNumbering, PostTerminalPolicy, TrackerConfig};
use crate::domain::{
    CleanupReport, Decision, ErrorEntry, ErrorReport, FailedRecord, FailedRecordSummary, JobId,
    RecordExport, RecordId, RecordState, RecordStats, RecoveryAttempt, SessionId, SessionStats,
    continue_decision, retry_decision,
};
use crate::error::{TrackerError, Violation};
use crate::ports::{Clock, SystemClock};

/// All four indices.
///
/// Kept behind one lock so cross-index updates (`mark_failed`, `cleanup`,
/// re-`initialize`) are atomic.
#[derive(Default)]
struct TrackerState {
    /// Single source of truth for record history.
    records: HashMap<RecordId, RecordState>,

    /// Session -> member records.
    sessions: HashMap<SessionId, HashSet<RecordId>>,

    /// Terminal failures awaiting manual review.
    failed: HashMap<RecordId, FailedRecord>,

    correlations: CorrelationIndex,
}

impl TrackerState {
    fn record_mut(&mut self, id: &RecordId) -> Result<&mut RecordState, TrackerError> {
        self.records
            .get_mut(id)
            .ok_or_else(|| TrackerError::RecordNotFound(id.clone()))
    }

    /// Remove `id` from its session, dropping the session once empty.
    ///
    /// Returns true when the session was dropped.
    fn leave_session(&mut self, session_id: &SessionId, id: &RecordId) -> bool {
        let Some(members) = self.sessions.get_mut(session_id) else {
            return false;
        };
        members.remove(id);
        if members.is_empty() {
            self.sessions.remove(session_id);
            return true;
        }
        false
    }

    /// Forget everything known about `id`, in every index.
    fn forget(&mut self, id: &RecordId) {
        if let Some(previous) = self.records.remove(id) {
            self.leave_session(&previous.session_id, id);
        }
        self.failed.remove(id);
        self.correlations.remove_record(id);
    }

    fn session_stats(&self, session_id: &SessionId) -> Option<SessionStats> {
        let members = self.sessions.get(session_id)?;
        let mut stats = SessionStats::new(session_id.clone());
        for record in members.iter().filter_map(|id| self.records.get(id)) {
            stats.add(record);
        }
        Some(stats)
    }

    fn failed_summaries(&self, display_field: &str) -> Vec<FailedRecordSummary> {
        let mut summaries: Vec<_> = self
            .failed
            .values()
            .filter_map(|failed| {
                let record = self.records.get(&failed.record_id)?;
                Some(FailedRecordSummary::new(failed, record, display_field))
            })
            .collect();
        summaries.sort_by(|a, b| {
            a.failed_at
                .cmp(&b.failed_at)
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
        summaries
    }

    fn cleanup(&mut self, cutoff: DateTime<Utc>) -> CleanupReport {
        let expired: Vec<RecordId> = self
            .records
            .values()
            .filter(|record| record.last_updated <= cutoff)
            .map(|record| record.id.clone())
            .collect();

        let mut report = CleanupReport::default();
        for id in &expired {
            let Some(record) = self.records.remove(id) else {
                continue;
            };
            report.records_removed += 1;
            if self.leave_session(&record.session_id, id) {
                report.sessions_removed += 1;
            }
            if self.failed.remove(id).is_some() {
                report.failed_removed += 1;
            }
        }

        let (entries, keys) = self.correlations.prune(cutoff);
        report.correlation_entries_removed = entries;
        report.correlation_keys_removed = keys;
        report
    }
}

/// In-memory tracker.
///
/// One mutex guards the whole store: every operation is linearizable, and no
/// lock is held across anything but in-memory work.
/// The clock is read under the lock, so timestamps follow lock order.
pub struct InMemoryTracker {
    state: Mutex<TrackerState>,
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
}

impl InMemoryTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: TrackerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            config,
            clock,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Reject attempt/error/recovery mutations on a processed record.
    fn ensure_open(&self, record: &RecordState) -> Result<(), TrackerError> {
        if record.status.is_terminal() && self.config.post_terminal == PostTerminalPolicy::Reject {
            warn!(record_id = %record.id, status = %record.status, "mutation on processed record rejected");
            return Err(TrackerError::InvariantViolation {
                id: record.id.clone(),
                violation: Violation::AlreadyProcessed,
            });
        }
        Ok(())
    }

    fn ensure_in_sequence(&self, record: &RecordState, number: u32) -> Result<(), TrackerError> {
        if self.config.attempt_numbering == AttemptNumbering::Permissive {
            return Ok(());
        }
        let expected = u32::try_from(record.attempts.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        if number != expected {
            warn!(record_id = %record.id, expected, got = number, "attempt out of sequence");
            return Err(TrackerError::InvariantViolation {
                id: record.id.clone(),
                violation: Violation::AttemptOutOfSequence {
                    expected,
                    got: number,
                },
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordTracker for InMemoryTracker {
    async fn initialize(
        &self,
        id: RecordId,
        payload: serde_json::Value,
        session_id: SessionId,
        job_id: JobId,
    ) -> Result<RecordState, TrackerError> {
        if id.is_empty() {
            return Err(TrackerError::InvalidId(RecordId::label()));
        }
        if session_id.is_empty() {
            return Err(TrackerError::InvalidId(SessionId::label()));
        }

        let mut state = self.state.lock().await;
        let record = RecordState::new(
            id.clone(),
            payload,
            session_id.clone(),
            job_id,
            self.config.default_max_attempts,
            self.now(),
        );
        if state.records.contains_key(&id) {
            warn!(record_id = %id, "record re-initialized, previous history dropped");
            state.forget(&id);
        }
        state
            .sessions
            .entry(session_id.clone())
            .or_default()
            .insert(id.clone());
        state.records.insert(id.clone(), record.clone());

        debug!(record_id = %id, session_id = %session_id, "record initialized");
        Ok(record)
    }

    async fn start_attempt(&self, id: &RecordId, number: u32) -> Result<(), TrackerError> {
        let mut state = self.state.lock().await;
        let now = self.now();
        let record = state.record_mut(id)?;
        self.ensure_open(record)?;
        self.ensure_in_sequence(record, number)?;

        record.start_attempt(number, now);
        debug!(record_id = %id, attempt = number, max_attempts = record.max_attempts, "attempt started");
        Ok(())
    }

    async fn record_error(
        &self,
        id: &RecordId,
        error: ErrorReport,
        context: Option<serde_json::Value>,
    ) -> Result<ErrorEntry, TrackerError> {
        let mut state = self.state.lock().await;
        let now = self.now();
        let record = state.record_mut(id)?;
        self.ensure_open(record)?;

        let entry = ErrorEntry::from_report(error, context, record.current_attempt, now);
        record.record_error(entry.clone());
        state.correlations.append(id, entry.clone());

        debug!(
            record_id = %id,
            kind = %entry.kind,
            recoverable = entry.recoverable,
            attempt = entry.attempt_number,
            "error recorded: {}",
            entry.message
        );
        Ok(entry)
    }

    async fn record_recovery_attempt(
        &self,
        id: &RecordId,
        kind: &str,
        success: bool,
        details: Option<serde_json::Value>,
    ) -> Result<RecoveryAttempt, TrackerError> {
        let mut state = self.state.lock().await;
        let now = self.now();
        let record = state.record_mut(id)?;
        self.ensure_open(record)?;

        let recovery = RecoveryAttempt::new(kind, success, details, now);
        if !record.record_recovery(recovery.clone()) {
            return Err(TrackerError::InvariantViolation {
                id: id.clone(),
                violation: Violation::NoActiveAttempt,
            });
        }

        debug!(record_id = %id, kind, success, "recovery attempt recorded");
        Ok(recovery)
    }

    async fn mark_processed(
        &self,
        id: &RecordId,
        result: Option<serde_json::Value>,
    ) -> Result<(), TrackerError> {
        let mut state = self.state.lock().await;
        let now = self.now();
        let record = state.record_mut(id)?;
        record.mark_processed(result, now);
        let attempts = record.attempts.len();

        if state.failed.remove(id).is_some() {
            info!(record_id = %id, "previously failed record completed, removed from review list");
        }
        info!(record_id = %id, attempts, "record completed");
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: &RecordId,
        reason: Option<String>,
        recoverable: bool,
    ) -> Result<(), TrackerError> {
        let mut state = self.state.lock().await;
        let now = self.now();
        let record = state.record_mut(id)?;
        record.mark_failed(reason.clone(), recoverable, now);
        let attempts = record.attempts.len();

        info!(
            record_id = %id,
            attempts,
            recoverable,
            reason = reason.as_deref().unwrap_or("unspecified"),
            "record failed"
        );
        state.failed.insert(
            id.clone(),
            FailedRecord {
                record_id: id.clone(),
                failed_at: now,
                recoverable,
                reason,
            },
        );
        Ok(())
    }

    async fn continue_decision(&self, id: &RecordId) -> Decision {
        let state = self.state.lock().await;
        continue_decision(state.records.get(id))
    }

    async fn retry_decision(&self, id: &RecordId) -> Decision {
        let state = self.state.lock().await;
        retry_decision(state.records.get(id))
    }

    async fn get_record_stats(&self, id: &RecordId) -> Option<RecordStats> {
        let state = self.state.lock().await;
        let now = self.now();
        state
            .records
            .get(id)
            .map(|record| RecordStats::from_record(record, now))
    }

    async fn get_session_stats(&self, session_id: &SessionId) -> Option<SessionStats> {
        let state = self.state.lock().await;
        state.session_stats(session_id)
    }

    async fn get_failed_records(&self) -> Vec<FailedRecordSummary> {
        let state = self.state.lock().await;
        state.failed_summaries(&self.config.display_name_field)
    }

    async fn cleanup(&self, max_age_hours: u64) -> CleanupReport {
        let mut state = self.state.lock().await;
        let now = self.now();
        // An age too large for chrono means "older than anything": nothing expires.
        let cutoff = i64::try_from(max_age_hours)
            .ok()
            .and_then(Duration::try_hours)
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let report = state.cleanup(cutoff);
        let remaining = state.records.len();
        drop(state);

        if report.is_empty() {
            debug!(max_age_hours, remaining, "cleanup found nothing to remove");
        } else {
            info!(
                max_age_hours,
                records = report.records_removed,
                sessions = report.sessions_removed,
                failed = report.failed_removed,
                correlation_entries = report.correlation_entries_removed,
                remaining,
                "cleanup removed stale state"
            );
        }
        report
    }

    async fn get_error_correlation(&self, id: &RecordId, kind: &str) -> Vec<ErrorEntry> {
        let state = self.state.lock().await;
        state.correlations.get(id, kind)
    }

    async fn export_record_state(&self, id: &RecordId) -> Option<RecordExport> {
        let state = self.state.lock().await;
        let now = self.now();
        let record = state.records.get(id)?;
        Some(RecordExport {
            record: record.clone(),
            stats: RecordStats::from_record(record, now),
            exported_at: now,
        })
    }

    async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }
}
