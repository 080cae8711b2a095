//! Retry eligibility - 次の attempt を開始してよいか
//!
//! どちらのゲートも record スナップショット上の純粋関数です（副作用なし）。
//! bool ではなく [`Decision`] を返すので、停止理由をログに残せます。

use serde::{Deserialize, Serialize};

use super::record::RecordState;

/// Why another attempt is not permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Unknown record id.
    NotFound,
    /// Record already reached a terminal state.
    AlreadyProcessed,
    /// `current_attempt >= max_attempts`.
    AttemptsExhausted,
    /// Record-level `recoverable` flag is false.
    Unrecoverable,
    /// The most recent error entry was marked non-recoverable.
    LastErrorUnrecoverable,
}

/// Outcome of a retry-eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    Proceed,
    Stop(StopReason),
}

impl Decision {
    pub fn is_proceed(self) -> bool {
        matches!(self, Decision::Proceed)
    }
}

/// Attempt-count and recoverability gate.
pub fn continue_decision(record: Option<&RecordState>) -> Decision {
    let Some(record) = record else {
        return Decision::Stop(StopReason::NotFound);
    };
    if record.is_processed {
        return Decision::Stop(StopReason::AlreadyProcessed);
    }
    if record.attempts_exhausted() {
        return Decision::Stop(StopReason::AttemptsExhausted);
    }
    if !record.recoverable {
        return Decision::Stop(StopReason::Unrecoverable);
    }
    Decision::Proceed
}

/// Retry gate.
///
/// Looks only at the single most recent error: a recoverable error recorded
/// after an unrecoverable one permits the retry again ("last error wins").
/// The record-level `recoverable` flag is deliberately not consulted here.
pub fn retry_decision(record: Option<&RecordState>) -> Decision {
    let Some(record) = record else {
        return Decision::Stop(StopReason::NotFound);
    };
    if record.is_processed {
        return Decision::Stop(StopReason::AlreadyProcessed);
    }
    if record.attempts_exhausted() {
        return Decision::Stop(StopReason::AttemptsExhausted);
    }
    if record.last_error().is_some_and(|error| !error.recoverable) {
        return Decision::Stop(StopReason::LastErrorUnrecoverable);
    }
    Decision::Proceed
}
