//! Domain model: ids, record/attempt/error history, retry decisions and views.

pub mod attempt;
pub mod decision;
pub mod errors;
pub mod ids;
pub mod record;
pub mod state;
pub mod stats;

pub use attempt::{Attempt, RecoveryAttempt};
pub use decision::{Decision, StopReason, continue_decision, retry_decision};
pub use errors::{ErrorEntry, ErrorReport};
pub use ids::{JobId, RecordId, SessionId};
pub use record::{DEFAULT_MAX_ATTEMPTS, FailedRecord, RecordState};
pub use state::{AttemptStatus, RecordStatus};
pub use stats::{CleanupReport, FailedRecordSummary, RecordExport, RecordStats, SessionStats};
