//! Concurrent table → schema entry map

use dashmap::DashMap;
use keyql_core::{Clock, SchemaCacheConfig, SystemClock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::entry::{CachedSchemaEntry, EntrySnapshot, RefreshGuard};
use crate::metadata::ColumnMap;

/// Schema cache keyed by table name.
///
/// Locking is per table: DashMap shards guard the map itself and each
/// entry carries its own lock and refresh flag, so work on one table never
/// waits on another.
pub struct SchemaCache {
    entries: DashMap<String, Arc<CachedSchemaEntry>>,
    config: SchemaCacheConfig,
    clock: Arc<dyn Clock>,
}

impl SchemaCache {
    pub fn new(config: SchemaCacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: SchemaCacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &SchemaCacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Entry for `table`, valid or not
    pub fn entry(&self, table: &str) -> Option<Arc<CachedSchemaEntry>> {
        if !self.config.enabled {
            return None;
        }
        self.entries.get(table).map(|e| Arc::clone(e.value()))
    }

    /// Valid cached columns for `table`
    pub fn get(&self, table: &str) -> Option<ColumnMap> {
        let result = self.entry(table).and_then(|entry| entry.get());
        if result.is_some() {
            tracing::debug!(table = %table, "schema cache hit");
        } else {
            tracing::debug!(table = %table, "schema cache miss");
        }
        result
    }

    /// Valid cached type codes for `table`
    pub fn get_type_codes(&self, table: &str) -> Option<HashMap<String, i32>> {
        self.entry(table).and_then(|entry| entry.type_codes())
    }

    /// Columns of the current entry even if it has expired
    pub fn get_stale(&self, table: &str) -> Option<ColumnMap> {
        self.entry(table).map(|entry| entry.peek_stale())
    }

    /// Store freshly discovered columns, replacing any previous entry
    pub fn put(&self, table: &str, columns: ColumnMap) {
        if !self.config.enabled {
            return;
        }
        tracing::debug!(table = %table, column_count = columns.len(), "cached schema");
        let entry = CachedSchemaEntry::new(
            table,
            columns,
            self.config.ttl_millis(),
            Arc::clone(&self.clock),
        );
        self.entries.insert(table.to_string(), Arc::new(entry));
    }

    /// Whether `table` has a valid entry
    pub fn is_cached(&self, table: &str) -> bool {
        self.entry(table).is_some_and(|entry| entry.is_valid())
    }

    /// Claim the refresh of an existing entry.
    ///
    /// `None` means there is no entry or another caller is already refreshing it.
    pub fn try_begin_refresh(&self, table: &str) -> Option<RefreshGuard> {
        self.entry(table).and_then(|entry| entry.try_begin_refresh())
    }

    /// Invalidate one table. The entry stays in place so stale reads and
    /// refresh coordination keep working until it is replaced.
    pub fn invalidate(&self, table: &str) {
        if let Some(entry) = self.entries.get(table) {
            tracing::info!(table = %table, "invalidating cached schema");
            entry.invalidate();
        }
    }

    pub fn invalidate_all(&self) {
        tracing::info!(count = self.entries.len(), "invalidating all cached schemas");
        for entry in self.entries.iter() {
            entry.invalidate();
        }
    }

    /// Drop the entry for one table entirely
    pub fn remove(&self, table: &str) -> bool {
        self.entries.remove(table).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Names of tables that currently have a valid entry
    pub fn cached_tables(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.value().is_valid())
            .map(|e| e.key().clone())
            .collect()
    }

    pub fn snapshots(&self) -> Vec<EntrySnapshot> {
        let mut snapshots: Vec<EntrySnapshot> =
            self.entries.iter().map(|e| e.value().snapshot()).collect();
        snapshots.sort_by(|a, b| a.table_name.cmp(&b.table_name));
        snapshots
    }

    pub fn stats(&self) -> SchemaCacheStats {
        let mut stats = SchemaCacheStats::default();
        for entry in self.entries.iter() {
            stats.entry_count += 1;
            if entry.is_valid() {
                stats.valid_count += 1;
            }
            if entry.is_refreshing() {
                stats.refreshing_count += 1;
            }
        }
        stats
    }
}

/// Schema cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaCacheStats {
    pub entry_count: usize,
    pub valid_count: usize,
    pub refreshing_count: usize,
}

impl SchemaCacheStats {
    pub fn invalid_count(&self) -> usize {
        self.entry_count - self.valid_count
    }
}
