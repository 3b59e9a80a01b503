use async_trait::async_trait;
use keyql_core::{DiscoveryContext, Result};
use std::collections::HashMap;

use crate::metadata::ColumnMap;

/// Discovers many tables at once and populates the schema cache
#[async_trait]
pub trait DiscoveryOrchestrator: Send + Sync {
    /// Discover every table in `tables`, up to the configured concurrency.
    ///
    /// Tables that fail are logged and left out of the returned map.
    async fn discover_tables(
        &self,
        tables: &[String],
        ctx: &DiscoveryContext,
    ) -> Result<HashMap<String, ColumnMap>>;
}

/// Cache probe and fire-and-forget loading for single tables
pub trait OnDemandLoader: Send + Sync {
    /// Whether `table` has a valid cached schema
    fn is_cached(&self, table: &str) -> bool;

    /// Whether `table` has a cache entry at all, expired or not
    fn is_resident(&self, table: &str) -> bool {
        self.is_cached(table)
    }

    /// Start loading `table` in the background. Never blocks the caller.
    fn preload(&self, table: &str, ctx: &DiscoveryContext);
}
