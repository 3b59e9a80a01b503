//! One table's cached schema with TTL and single-flight refresh

use keyql_core::Clock;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use crate::metadata::{ColumnMap, type_codes};

/// Cached column metadata for one table.
///
/// Validity only ever goes from true to false, either when the TTL has
/// elapsed (noticed lazily on read) or on explicit invalidation. A refreshed
/// table gets a brand new entry; an invalid entry is never revived.
pub struct CachedSchemaEntry {
    table_name: String,
    created_at: i64,
    ttl_ms: i64,
    clock: Arc<dyn Clock>,
    columns: RwLock<ColumnMap>,
    valid: AtomicBool,
    refreshing: AtomicBool,
    last_access: AtomicI64,
    refresh_count: AtomicU64,
}

impl CachedSchemaEntry {
    pub fn new(
        table_name: impl Into<String>,
        columns: ColumnMap,
        ttl_ms: i64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now_millis();
        Self {
            table_name: table_name.into(),
            created_at: now,
            ttl_ms,
            clock,
            columns: RwLock::new(columns),
            valid: AtomicBool::new(true),
            refreshing: AtomicBool::new(false),
            last_access: AtomicI64::new(now),
            refresh_count: AtomicU64::new(0),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn ttl_ms(&self) -> i64 {
        self.ttl_ms
    }

    /// Check validity, latching the entry invalid once the TTL has passed.
    ///
    /// A TTL of zero or less is never valid. A clock that moves backwards
    /// cannot make an expired entry valid again.
    pub fn is_valid(&self) -> bool {
        if !self.valid.load(Ordering::Acquire) {
            return false;
        }
        let elapsed = self.clock.now_millis() - self.created_at;
        if self.ttl_ms <= 0 || elapsed > self.ttl_ms {
            if self.valid.swap(false, Ordering::AcqRel) {
                tracing::debug!(table = %self.table_name, elapsed_ms = elapsed, ttl_ms = self.ttl_ms, "schema entry expired");
            }
            return false;
        }
        true
    }

    /// Columns if the entry is still valid, recording the access
    pub fn get(&self) -> Option<ColumnMap> {
        let columns = self.columns.read();
        if !self.is_valid() {
            return None;
        }
        self.last_access
            .store(self.clock.now_millis(), Ordering::Release);
        Some(columns.clone())
    }

    /// Type-code view of the columns if the entry is still valid
    pub fn type_codes(&self) -> Option<HashMap<String, i32>> {
        self.get().map(|columns| type_codes(&columns))
    }

    /// Columns regardless of validity, for callers that lost a refresh race
    pub fn peek_stale(&self) -> ColumnMap {
        self.columns.read().clone()
    }

    /// Replace the columns of a valid entry. Returns false if the entry is no
    /// longer valid, in which case nothing changes.
    pub fn update(&self, columns: ColumnMap) -> bool {
        let mut current = self.columns.write();
        if !self.is_valid() {
            tracing::debug!(table = %self.table_name, "refusing to update invalid schema entry");
            return false;
        }
        *current = columns;
        self.refresh_count.fetch_add(1, Ordering::AcqRel);
        self.last_access
            .store(self.clock.now_millis(), Ordering::Release);
        true
    }

    /// Mark the entry invalid for good
    pub fn invalidate(&self) {
        let _columns = self.columns.write();
        if self.valid.swap(false, Ordering::AcqRel) {
            tracing::debug!(table = %self.table_name, "schema entry invalidated");
        }
    }

    /// Try to become the one caller that refreshes this table.
    ///
    /// Returns false when another caller already holds the refresh. The winner
    /// must call [`mark_refresh_complete`](Self::mark_refresh_complete), or use
    /// [`try_begin_refresh`](Self::try_begin_refresh) which does it on drop.
    pub fn mark_refreshing(&self) -> bool {
        let granted = self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !granted {
            tracing::debug!(table = %self.table_name, "refresh already in progress");
        }
        granted
    }

    pub fn mark_refresh_complete(&self) {
        self.refreshing.store(false, Ordering::Release);
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Claim the refresh, releasing it when the returned guard drops
    pub fn try_begin_refresh(self: &Arc<Self>) -> Option<RefreshGuard> {
        self.mark_refreshing().then(|| RefreshGuard {
            entry: Arc::clone(self),
        })
    }

    pub fn age_ms(&self) -> i64 {
        self.clock.now_millis() - self.created_at
    }

    /// Time since the entry was last read or updated
    pub fn idle_ms(&self) -> i64 {
        self.clock.now_millis() - self.last_access.load(Ordering::Acquire)
    }

    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            table_name: self.table_name.clone(),
            age_ms: self.age_ms(),
            idle_ms: self.idle_ms(),
            refresh_count: self.refresh_count(),
            valid: self.is_valid(),
            refreshing: self.is_refreshing(),
            column_count: self.columns.read().len(),
        }
    }
}

impl std::fmt::Debug for CachedSchemaEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSchemaEntry")
            .field("table_name", &self.table_name)
            .field("ttl_ms", &self.ttl_ms)
            .field("valid", &self.valid.load(Ordering::Relaxed))
            .field("refreshing", &self.refreshing.load(Ordering::Relaxed))
            .finish()
    }
}

/// Held by the caller that won a refresh; clears the refreshing flag on drop
pub struct RefreshGuard {
    entry: Arc<CachedSchemaEntry>,
}

impl RefreshGuard {
    pub fn entry(&self) -> &Arc<CachedSchemaEntry> {
        &self.entry
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.entry.mark_refresh_complete();
    }
}

/// Point-in-time view of one entry for monitoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySnapshot {
    pub table_name: String,
    pub age_ms: i64,
    pub idle_ms: i64,
    pub refresh_count: u64,
    pub valid: bool,
    pub refreshing: bool,
    pub column_count: usize,
}
