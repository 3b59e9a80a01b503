//! Schema discovery service
//!
//! Couples a [`SchemaDetector`] with a [`SchemaCache`] and provides the
//! cache lookup path used by callers and the preloader.

use async_trait::async_trait;
use keyql_core::config::clamp_concurrency;
use keyql_core::{
    Clock, DiscoveryContext, KeyqlConfig, KeyqlError, Result, StoreClient, SystemClock, Traced,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::contract::{DiscoveryOrchestrator, OnDemandLoader};
use crate::cache::SchemaCache;
use crate::discovery::SchemaDetector;
use crate::metadata::{ColumnMap, ColumnMetadata, TableKeyInfo, type_codes};

/// Cached schema discovery for one store.
///
/// Cloning is cheap and clones share the detector, cache and concurrency
/// limit, so a clone can be moved into background tasks.
#[derive(Clone)]
pub struct SchemaDiscoveryService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    detector: SchemaDetector,
    cache: SchemaCache,
    /// Bounds concurrent discoveries against the store
    permits: Semaphore,
}

impl SchemaDiscoveryService {
    pub fn new(store: Arc<dyn StoreClient>, config: &KeyqlConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn StoreClient>,
        config: &KeyqlConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let detector = SchemaDetector::new(store, config.discovery.clone());
        let cache = SchemaCache::with_clock(config.schema_cache.clone(), clock);
        Self::from_parts(detector, cache, config.discovery.max_concurrency)
    }

    pub fn from_parts(detector: SchemaDetector, cache: SchemaCache, max_concurrency: usize) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                detector,
                cache,
                permits: Semaphore::new(clamp_concurrency(max_concurrency)),
            }),
        }
    }

    pub fn detector(&self) -> &SchemaDetector {
        &self.inner.detector
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.inner.cache
    }

    /// Column metadata for `table`, served from the cache when possible.
    ///
    /// An expired entry is refreshed by exactly one caller; anyone arriving
    /// while that refresh runs gets the stale columns instead of starting a
    /// second discovery.
    #[tracing::instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id))]
    pub async fn column_metadata(&self, table: &str, ctx: DiscoveryContext) -> Result<Traced<ColumnMap>> {
        let cache = &self.inner.cache;
        if let Some(columns) = cache.get(table) {
            return Ok(Traced::new(columns, ctx));
        }

        if let Some(entry) = cache.entry(table) {
            let Some(_guard) = entry.try_begin_refresh() else {
                tracing::debug!(table = %table, "refresh in progress, serving stale schema");
                return Ok(Traced::new(entry.peek_stale(), ctx));
            };
            tracing::debug!(table = %table, "refreshing expired schema");
            let traced = self.inner.detector.rediscover(table, ctx).await?;
            self.store(table, &traced.value);
            return Ok(traced);
        }

        let traced = self.inner.detector.detect_column_metadata(table, ctx).await?;
        self.store(table, &traced.value);
        Ok(traced)
    }

    /// Column name to relational type code for `table`
    pub async fn schema(&self, table: &str, ctx: DiscoveryContext) -> Result<Traced<HashMap<String, i32>>> {
        let traced = self.column_metadata(table, ctx).await?;
        Ok(traced.map(|columns| type_codes(&columns)))
    }

    /// Columns of `table` in catalog order: primary keys, secondary keys, then by name.
    ///
    /// If the key layout cannot be described, columns are ordered by name only.
    pub async fn ordered_columns(
        &self,
        table: &str,
        ctx: DiscoveryContext,
    ) -> Result<Traced<Vec<ColumnMetadata>>> {
        let traced = self.column_metadata(table, ctx).await?;
        let key_info = match self.inner.detector.table_key_info(table).await {
            Ok(key_info) => key_info,
            Err(error) => {
                tracing::warn!(table = %table, error = %error, "key layout unavailable, ordering columns by name");
                TableKeyInfo::new(table, Vec::new(), Vec::new())
            }
        };
        Ok(traced.map(|columns| key_info.order_columns(columns.into_values())))
    }

    /// Discover `table` again regardless of what is cached.
    ///
    /// If another caller is already refreshing the same entry, its stale
    /// columns are returned and no discovery is started.
    pub async fn refresh_table(&self, table: &str, ctx: DiscoveryContext) -> Result<Traced<ColumnMap>> {
        let entry = self.inner.cache.entry(table);
        let _guard = match &entry {
            Some(entry) => match entry.try_begin_refresh() {
                Some(guard) => Some(guard),
                None => return Ok(Traced::new(entry.peek_stale(), ctx)),
            },
            None => None,
        };

        let traced = self.inner.detector.rediscover(table, ctx).await?;
        self.store(table, &traced.value);
        Ok(traced)
    }

    /// Drop cached and memoized discoveries for `table`
    pub fn invalidate(&self, table: &str) {
        self.inner.cache.invalidate(table);
        self.inner.detector.memo().remove(table);
    }

    pub fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.detector.clear_cache();
    }

    fn store(&self, table: &str, columns: &ColumnMap) {
        // Empty means every fallback failed
        if columns.is_empty() {
            tracing::debug!(table = %table, "not caching empty schema");
            return;
        }
        self.inner.cache.put(table, columns.clone());
    }
}

#[async_trait]
impl DiscoveryOrchestrator for SchemaDiscoveryService {
    #[tracing::instrument(skip(self, tables, ctx), fields(correlation_id = %ctx.correlation_id, table_count = tables.len()))]
    async fn discover_tables(
        &self,
        tables: &[String],
        ctx: &DiscoveryContext,
    ) -> Result<HashMap<String, ColumnMap>> {
        let mut handles = Vec::with_capacity(tables.len());

        for table in tables {
            let service = self.clone();
            let table = table.clone();
            let ctx = ctx.child();

            handles.push(tokio::spawn(async move {
                let _permit = match service.inner.permits.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return (table, Err(KeyqlError::Cancelled)),
                };
                let result = service.refresh_table(&table, ctx).await;
                (table, result)
            }));
        }

        let mut discovered = HashMap::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok((table, Ok(traced))) => {
                    discovered.insert(table, traced.into_inner());
                }
                Ok((table, Err(error))) => {
                    tracing::warn!(table = %table, error = %error, "table discovery failed");
                }
                Err(error) => {
                    tracing::error!(error = %error, "discovery task failed");
                }
            }
        }

        tracing::info!(
            requested = tables.len(),
            discovered = discovered.len(),
            "discovered tables"
        );
        Ok(discovered)
    }
}

impl OnDemandLoader for SchemaDiscoveryService {
    fn is_cached(&self, table: &str) -> bool {
        self.inner.cache.is_cached(table)
    }

    fn is_resident(&self, table: &str) -> bool {
        self.inner.cache.entry(table).is_some()
    }

    fn preload(&self, table: &str, ctx: &DiscoveryContext) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(table = %table, "no async runtime, skipping preload");
            return;
        };

        let service = self.clone();
        let table = table.to_string();
        let ctx = ctx.child();
        runtime.spawn(async move {
            let Ok(_permit) = service.inner.permits.acquire().await else {
                return;
            };
            match service.column_metadata(&table, ctx).await {
                Ok(traced) => {
                    tracing::debug!(table = %table, column_count = traced.value.len(), "preloaded schema");
                }
                Err(error) => {
                    tracing::warn!(table = %table, error = %error, "preload failed");
                }
            }
        });
    }
}
