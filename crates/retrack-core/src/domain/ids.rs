//! Domain identifiers (strongly-typed IDs).
//!
//! Record, session and job ids are supplied by the orchestrator, so unlike
//! generated ids they are plain strings. A phantom marker keeps them apart at
//! compile time: a `SessionId` can never be passed where a `RecordId` is expected.
//!
//! Fresh ids for callers that have none come from [`crate::ports::IdGenerator`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Marker trait for each id type.
///
/// `label()` names the id in error messages and log fields.
pub trait IdMarker: Send + Sync + 'static {
    fn label() -> &'static str;
}

/// Generic string id.
///
/// `T` is zero-sized and only exists at compile time.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    value: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn label() -> &'static str {
        T::label()
    }
}

// Manual impls: derives would put bounds on `T`, which is never instantiated.

impl<T: IdMarker> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T: IdMarker> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: IdMarker> Eq for Id<T> {}

impl<T: IdMarker> std::hash::Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T: IdMarker> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: IdMarker> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T: IdMarker> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", T::label(), self.value)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T: IdMarker> From<&str> for Id<T> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> From<String> for Id<T> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ========================================
// Markers
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Record {}

impl IdMarker for Record {
    fn label() -> &'static str {
        "record"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Session {}

impl IdMarker for Session {
    fn label() -> &'static str {
        "session"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Job {}

impl IdMarker for Job {
    fn label() -> &'static str {
        "job"
    }
}

/// Identifier of a record (one tracked unit of work).
pub type RecordId = Id<Record>;

/// Identifier of a session (records processed together, e.g. one login).
pub type SessionId = Id<Session>;

/// Identifier of the batch job a record was submitted under.
pub type JobId = Id<Job>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_raw_value() {
        let record = RecordId::new("r1");
        let session = SessionId::from("s1");

        assert_eq!(record.to_string(), "r1");
        assert_eq!(session.as_str(), "s1");
        assert_eq!(format!("{record:?}"), "record(\"r1\")");

        // let _: SessionId = record; // <- does not compile
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = JobId::new("j-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"j-42\"");

        let back: JobId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn marker_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<RecordId>(), size_of::<String>());
    }

    #[test]
    fn labels_name_the_id_kind() {
        assert_eq!(RecordId::label(), "record");
        assert_eq!(SessionId::label(), "session");
        assert_eq!(JobId::label(), "job");
    }
}
