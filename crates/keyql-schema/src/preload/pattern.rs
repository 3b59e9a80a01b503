//! Table access history for pattern-based preloading
//!
//! Events are only recorded. Nothing derives related tables from them yet,
//! so the pattern-based strategy never triggers a preload on its own.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;

pub const DEFAULT_ACCESS_LOG_CAPACITY: usize = 1000;

/// One recorded table access
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessEvent {
    pub table: String,
    pub accessed_at: DateTime<Utc>,
}

/// Bounded in-memory log of table accesses, oldest dropped first
pub struct AccessPatternRecorder {
    events: Mutex<VecDeque<AccessEvent>>,
    capacity: usize,
}

impl AccessPatternRecorder {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_ACCESS_LOG_CAPACITY))),
            capacity,
        }
    }

    pub fn record(&self, table: &str) {
        let mut events = self.events.lock();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(AccessEvent {
            table: table.to_string(),
            accessed_at: Utc::now(),
        });
    }

    /// Recorded events, oldest first
    pub fn events(&self) -> Vec<AccessEvent> {
        self.events.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Default for AccessPatternRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_ACCESS_LOG_CAPACITY)
    }
}
