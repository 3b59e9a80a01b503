//! Correlation context for discovery calls
//!
//! A [`DiscoveryContext`] is created by the caller, passed into each
//! top-level entry point, and handed back alongside the result in a
//! [`Traced`] wrapper. Work that hops onto other tasks carries the context
//! with it instead of looking it up from thread-local state.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Correlation data attached to one top-level discovery call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryContext {
    pub correlation_id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl DiscoveryContext {
    /// Create a context with a fresh correlation id
    pub fn new() -> Self {
        Self::with_correlation_id(Uuid::new_v4())
    }

    /// Create a context that continues an existing correlation id
    pub fn with_correlation_id(correlation_id: Uuid) -> Self {
        Self {
            correlation_id,
            started_at: Utc::now(),
        }
    }

    /// Derive a context for a sub-operation that keeps the same correlation id
    pub fn child(&self) -> Self {
        Self {
            correlation_id: self.correlation_id,
            started_at: Utc::now(),
        }
    }

    /// Elapsed wall time since the context was created, in milliseconds
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }
}

impl Default for DiscoveryContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A value returned together with the context it was produced under
#[derive(Debug, Clone)]
pub struct Traced<T> {
    pub value: T,
    pub context: DiscoveryContext,
}

impl<T> Traced<T> {
    pub fn new(value: T, context: DiscoveryContext) -> Self {
        Self { value, context }
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Traced<U> {
        Traced {
            value: f(self.value),
            context: self.context,
        }
    }
}
