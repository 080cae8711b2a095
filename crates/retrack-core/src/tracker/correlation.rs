//! Error-correlation index - (record, error kind) -> 記録順のエラー

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::domain::{ErrorEntry, RecordId};

#[derive(Debug, Default)]
pub(crate) struct CorrelationIndex {
    entries: HashMap<(RecordId, String), Vec<ErrorEntry>>,
}

impl CorrelationIndex {
    pub(crate) fn append(&mut self, id: &RecordId, entry: ErrorEntry) {
        self.entries
            .entry((id.clone(), entry.kind.clone()))
            .or_default()
            .push(entry);
    }

    pub(crate) fn get(&self, id: &RecordId, kind: &str) -> Vec<ErrorEntry> {
        // Tuple keys cannot be borrowed as (&RecordId, &str), so build the owned key.
        self.entries
            .get(&(id.clone(), kind.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Drop every key belonging to `id`.
    pub(crate) fn remove_record(&mut self, id: &RecordId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(record_id, _), _| record_id != id);
        before - self.entries.len()
    }

    /// Remove entries recorded at or before `cutoff`, then empty keys.
    ///
    /// Returns `(entries_removed, keys_removed)`.
    pub(crate) fn prune(&mut self, cutoff: DateTime<Utc>) -> (usize, usize) {
        let mut entries_removed = 0;
        for list in self.entries.values_mut() {
            let before = list.len();
            list.retain(|entry| entry.timestamp > cutoff);
            entries_removed += before - list.len();
        }

        let before = self.entries.len();
        self.entries.retain(|_, list| !list.is_empty());
        (entries_removed, before - self.entries.len())
    }

    #[cfg(test)]
    pub(crate) fn key_count(&self) -> usize {
        self.entries.len()
    }
}
