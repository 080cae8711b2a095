use thiserror::Error;

use crate::domain::RecordId;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("{0} id must not be empty")]
    InvalidId(&'static str),

    #[error("invariant violated for record {id}: {violation}")]
    InvariantViolation { id: RecordId, violation: Violation },
}

/// Mutation rejected because it would break a record invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("record is already processed")]
    AlreadyProcessed,

    #[error("attempt {got} out of sequence, expected {expected}")]
    AttemptOutOfSequence { expected: u32, got: u32 },

    #[error("no attempt has been started")]
    NoActiveAttempt,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
}
