//! Record state: the authoritative history of one record.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::attempt::{Attempt, RecoveryAttempt};
use super::errors::ErrorEntry;
use super::ids::{JobId, RecordId, SessionId};
use super::state::{AttemptStatus, RecordStatus};

/// Default attempt budget for a record.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Full processing history of a record.
///
/// Design:
/// - Created once by `initialize`, mutated in place until terminal.
/// - `attempts` and `errors` are append-only.
/// - All state transitions happen through the methods below; the tracker owns
///   the record and hands out clones only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordState {
    pub id: RecordId,

    /// Opaque caller data. Carries the display name used in failure reports.
    pub payload: serde_json::Value,

    pub session_id: SessionId,
    pub job_id: JobId,
    pub status: RecordStatus,
    pub attempts: Vec<Attempt>,

    /// Number passed to the most recent `start_attempt` (0 before any).
    pub current_attempt: u32,

    /// Fixed at creation.
    pub max_attempts: u32,

    /// Record-level errors across all attempts.
    pub errors: Vec<ErrorEntry>,

    pub start_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,

    pub is_processed: bool,
    pub recoverable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl RecordState {
    pub fn new(
        id: RecordId,
        payload: serde_json::Value,
        session_id: SessionId,
        job_id: JobId,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            payload,
            session_id,
            job_id,
            status: RecordStatus::Pending,
            attempts: Vec::new(),
            current_attempt: 0,
            max_attempts,
            errors: Vec::new(),
            start_time: now,
            last_updated: now,
            completed_at: None,
            failed_at: None,
            is_processed: false,
            recoverable: true,
            result: None,
            failure_reason: None,
        }
    }

    /// Append a new attempt and move to Processing.
    pub fn start_attempt(&mut self, number: u32, now: DateTime<Utc>) {
        self.attempts.push(Attempt::new(number, now));
        self.current_attempt = number;
        self.status = RecordStatus::Processing;
        self.last_updated = now;
    }

    /// Append an error to the current attempt (if any) and to the record.
    pub fn record_error(&mut self, entry: ErrorEntry) {
        self.last_updated = entry.timestamp;
        if let Some(attempt) = self.attempts.last_mut() {
            attempt.errors.push(entry.clone());
        }
        self.errors.push(entry);
    }

    /// Append a recovery attempt to the current attempt.
    ///
    /// Returns `false` (and changes nothing) when no attempt has been started.
    pub fn record_recovery(&mut self, recovery: RecoveryAttempt) -> bool {
        let at = recovery.timestamp;
        let Some(attempt) = self.attempts.last_mut() else {
            return false;
        };
        attempt.recovery_attempts.push(recovery);
        self.last_updated = at;
        true
    }

    /// Mark as completed.
    ///
    /// Re-finalizing a failed record drops its failure fields; the attempt
    /// that already ended keeps its outcome.
    pub fn mark_processed(&mut self, result: Option<serde_json::Value>, now: DateTime<Utc>) {
        self.status = RecordStatus::Completed;
        self.is_processed = true;
        self.completed_at = Some(now);
        self.result = result;
        self.failed_at = None;
        self.failure_reason = None;
        self.recoverable = true;
        self.last_updated = now;
        self.finish_open_attempt(AttemptStatus::Completed, now);
    }

    /// Mark as failed. `recoverable` overrides the record-level flag.
    pub fn mark_failed(&mut self, reason: Option<String>, recoverable: bool, now: DateTime<Utc>) {
        self.status = RecordStatus::Failed;
        self.is_processed = true;
        self.failed_at = Some(now);
        self.failure_reason = reason;
        self.recoverable = recoverable;
        self.completed_at = None;
        self.result = None;
        self.last_updated = now;
        self.finish_open_attempt(AttemptStatus::Failed, now);
    }

    fn finish_open_attempt(&mut self, status: AttemptStatus, now: DateTime<Utc>) {
        if let Some(attempt) = self
            .attempts
            .last_mut()
            .filter(|attempt| attempt.end_time.is_none())
        {
            attempt.finish(status, now);
        }
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.current_attempt >= self.max_attempts
    }

    pub fn last_error(&self) -> Option<&ErrorEntry> {
        self.errors.last()
    }

    pub fn total_recovery_attempts(&self) -> usize {
        self.attempts
            .iter()
            .map(|attempt| attempt.recovery_attempts.len())
            .sum()
    }

    /// Terminal timestamp minus start, or `now` minus start while still open.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let end = match self.status {
            RecordStatus::Completed => self.completed_at,
            RecordStatus::Failed => self.failed_at,
            _ => None,
        };
        end.unwrap_or(now) - self.start_time
    }

    /// Human-readable name taken from `payload[field]`, falling back to the id.
    pub fn display_name(&self, field: &str) -> String {
        match self.payload.get(field) {
            Some(serde_json::Value::String(name)) => name.clone(),
            Some(serde_json::Value::Null) | None => self.id.to_string(),
            Some(other) => other.to_string(),
        }
    }
}

/// Entry of the failed-record index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRecord {
    pub record_id: RecordId,
    pub failed_at: DateTime<Utc>,
    pub recoverable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
