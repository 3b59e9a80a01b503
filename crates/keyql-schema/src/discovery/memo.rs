//! Per-detector memo of successful discoveries

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::metadata::ColumnMap;

/// Untimed table → columns memo owned by one detector.
///
/// Only results produced by the configured mode land here. Fallback results
/// are never memoized, so a transient store failure is retried on the next call.
#[derive(Default)]
pub struct DiscoveryMemo {
    entries: RwLock<HashMap<String, ColumnMap>>,
}

impl DiscoveryMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, table: &str) -> Option<ColumnMap> {
        let result = self.entries.read().get(table).cloned();
        if result.is_some() {
            tracing::trace!(table = %table, "discovery memo hit");
        }
        result
    }

    pub fn insert(&self, table: &str, columns: ColumnMap) {
        self.entries.write().insert(table.to_string(), columns);
    }

    /// Forget one table, returning whether it was memoized
    pub fn remove(&self, table: &str) -> bool {
        self.entries.write().remove(table).is_some()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write();
        tracing::debug!(count = entries.len(), "clearing discovery memo");
        entries.clear();
    }

    pub fn contains(&self, table: &str) -> bool {
        self.entries.read().contains_key(table)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
