//! retrack-core
//!
//! In-memory tracking of per-record processing history for batches submitted
//! to a failure-prone external workflow.
//!
//! # Modules
//! - **domain**: records, attempts, errors, recovery attempts, retry decisions, views
//! - **tracker**: `RecordTracker` port and the `InMemoryTracker` store
//! - **ports**: clock and id generation
//! - **app**: `TrackerBuilder` and the periodic `CleanupLoop`
//! - **config**: TOML-backed `TrackerConfig`
//! - **error**: `TrackerError`, `ConfigError`

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod tracker;

pub use app::{BuildError, CleanupLoop, TrackerBuilder};
pub use config::TrackerConfig;
pub use error::{ConfigError, TrackerError, Violation};
pub use tracker::{InMemoryTracker, RecordTracker};
