//! App: wiring around the tracker.
//!
//! - **TrackerBuilder**: construction and start-up validation
//! - **CleanupLoop**: periodic purge of stale records

pub mod builder;
pub mod cleanup_loop;

pub use self::builder::{BuildError, TrackerBuilder};
pub use self::cleanup_loop::CleanupLoop;
