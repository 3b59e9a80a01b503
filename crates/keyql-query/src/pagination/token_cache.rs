//! Checkpoint cache keyed by query pattern and row offset

use indexmap::IndexMap;
use keyql_core::{Clock, OffsetCacheConfig, SystemClock};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// A continuation token remembered at a row offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenEntry {
    offset: u64,
    token: String,
    created_at: i64,
}

impl TokenEntry {
    fn new(offset: u64, token: String, created_at: i64) -> Self {
        Self {
            offset,
            token,
            created_at,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    fn is_expired(&self, now: i64, ttl_ms: i64) -> bool {
        ttl_ms <= 0 || now.saturating_sub(self.created_at) > ttl_ms
    }
}

/// Where a paginated read for some target offset should start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePoint {
    /// Token to resume the scan from, `None` to start at the beginning
    pub token: Option<String>,
    /// Offset of the first row the token yields
    pub start_offset: u64,
    /// Rows to discard after resuming before the target row is reached
    pub rows_to_skip: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OffsetCacheStats {
    pub query_count: usize,
    pub checkpoint_count: usize,
    pub max_size: usize,
    pub interval: u64,
    pub ttl_ms: i64,
}

/// Collapse whitespace runs and case-fold, so equivalent query text shares checkpoints
pub fn normalize_pattern(pattern: &str) -> String {
    pattern
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Per-query bounded map of offset to continuation token.
///
/// Each query keeps at most `max_size` checkpoints in least-recently-used
/// order: the front of the map is evicted first, and both inserts and
/// lookups move a checkpoint to the back. Entries expire after the shared
/// TTL but are only removed by [`evict_expired`](Self::evict_expired) or
/// the explicit clear calls. Writes to the underlying data never
/// invalidate anything here.
pub struct OffsetTokenCache {
    config: OffsetCacheConfig,
    clock: Arc<dyn Clock>,
    queries: RwLock<HashMap<String, IndexMap<u64, TokenEntry>>>,
}

impl OffsetTokenCache {
    pub fn new(config: OffsetCacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: OffsetCacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            queries: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &OffsetCacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn interval(&self) -> u64 {
        self.config.interval.max(1)
    }

    fn max_size(&self) -> usize {
        self.config.max_size.max(1)
    }

    /// Remember `token` as the continuation token for row `offset`.
    ///
    /// Returns false without storing anything when the cache is disabled,
    /// the token is empty, or `offset` is not a multiple of the interval.
    pub fn put(&self, pattern: &str, offset: u64, token: impl Into<String>) -> bool {
        let token = token.into();
        if !self.is_enabled() || token.is_empty() {
            return false;
        }
        if offset % self.interval() != 0 {
            tracing::trace!(offset, interval = self.interval(), "offset is not a checkpoint boundary");
            return false;
        }

        let key = normalize_pattern(pattern);
        let entry = TokenEntry::new(offset, token, self.clock.now_millis());
        let max_size = self.max_size();

        let mut queries = self.queries.write();
        let checkpoints = queries.entry(key).or_default();
        checkpoints.shift_remove(&offset);
        checkpoints.insert(offset, entry);

        while checkpoints.len() > max_size {
            if let Some((evicted, _)) = checkpoints.shift_remove_index(0) {
                tracing::debug!(offset = evicted, "evicted least recently used checkpoint");
            }
        }
        true
    }

    /// Token of the closest live checkpoint at or before `target_offset`
    pub fn get_nearest_token(&self, pattern: &str, target_offset: u64) -> Option<String> {
        self.nearest_entry(pattern, target_offset)
            .map(|entry| entry.token)
    }

    /// The closest live checkpoint at or before `target_offset`.
    ///
    /// A hit counts as use for LRU ordering.
    pub fn nearest_entry(&self, pattern: &str, target_offset: u64) -> Option<TokenEntry> {
        if !self.is_enabled() {
            return None;
        }
        let key = normalize_pattern(pattern);
        let now = self.clock.now_millis();
        let ttl_ms = self.config.ttl_millis();

        let mut queries = self.queries.write();
        let checkpoints = queries.get_mut(&key)?;

        let best = checkpoints
            .values()
            .filter(|entry| entry.offset <= target_offset && !entry.is_expired(now, ttl_ms))
            .map(|entry| entry.offset)
            .max()?;

        let entry = checkpoints.shift_remove(&best)?;
        checkpoints.insert(best, entry.clone());
        Some(entry)
    }

    /// Where to start reading to reach row `target_offset` of `pattern`
    pub fn resume_point(&self, pattern: &str, target_offset: u64) -> ResumePoint {
        match self.nearest_entry(pattern, target_offset) {
            Some(entry) => ResumePoint {
                start_offset: entry.offset,
                rows_to_skip: target_offset - entry.offset,
                token: Some(entry.token),
            },
            None => ResumePoint {
                token: None,
                start_offset: 0,
                rows_to_skip: target_offset,
            },
        }
    }

    /// Drop expired checkpoints and any query left without checkpoints.
    ///
    /// Returns the number of checkpoints removed.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let ttl_ms = self.config.ttl_millis();
        let mut removed = 0;

        let mut queries = self.queries.write();
        queries.retain(|_, checkpoints| {
            let before = checkpoints.len();
            checkpoints.retain(|_, entry| !entry.is_expired(now, ttl_ms));
            removed += before - checkpoints.len();
            !checkpoints.is_empty()
        });

        if removed > 0 {
            tracing::debug!(removed, remaining_queries = queries.len(), "evicted expired checkpoints");
        }
        removed
    }

    /// Forget every checkpoint of `pattern`
    pub fn clear_query(&self, pattern: &str) -> bool {
        let removed = self.queries.write().remove(&normalize_pattern(pattern)).is_some();
        if removed {
            tracing::debug!("cleared query checkpoints");
        }
        removed
    }

    pub fn clear_all(&self) {
        let mut queries = self.queries.write();
        let count = queries.len();
        queries.clear();
        tracing::info!(queries = count, "cleared all pagination checkpoints");
    }

    /// Checkpoint offsets of `pattern`, least recently used first
    pub fn checkpoints(&self, pattern: &str) -> Vec<u64> {
        self.queries
            .read()
            .get(&normalize_pattern(pattern))
            .map(|checkpoints| checkpoints.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> OffsetCacheStats {
        let queries = self.queries.read();
        OffsetCacheStats {
            query_count: queries.len(),
            checkpoint_count: queries.values().map(IndexMap::len).sum(),
            max_size: self.max_size(),
            interval: self.interval(),
            ttl_ms: self.config.ttl_millis(),
        }
    }
}

impl Default for OffsetTokenCache {
    fn default() -> Self {
        Self::new(OffsetCacheConfig::default())
    }
}
