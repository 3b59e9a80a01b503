//! Mode dispatch and fallback chain for single-table discovery

use keyql_core::{
    DiscoveryConfig, DiscoveryContext, DiscoveryMode, KeyqlError, Result, StoreClient,
    TableDescription, Traced, TypeCategory, hints_sample_size,
};
use std::collections::HashMap;
use std::sync::Arc;

use super::memo::DiscoveryMemo;
use crate::inference::{SamplingEngine, profile_items};
use crate::metadata::{ColumnMap, ColumnMetadata, DiscoverySource, TableKeyInfo, type_codes};

/// Discovers column metadata for tables of one store
pub struct SchemaDetector {
    store: Arc<dyn StoreClient>,
    sampler: SamplingEngine,
    config: DiscoveryConfig,
    memo: DiscoveryMemo,
}

impl SchemaDetector {
    pub fn new(store: Arc<dyn StoreClient>, config: DiscoveryConfig) -> Self {
        let sampler = SamplingEngine::new(store.clone(), config.sample_strategy);
        Self {
            store,
            sampler,
            config,
            memo: DiscoveryMemo::new(),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn memo(&self) -> &DiscoveryMemo {
        &self.memo
    }

    /// Empty the discovery memo
    pub fn clear_cache(&self) {
        self.memo.clear();
    }

    /// Discover column metadata for `table`, using the memo when it has an answer.
    ///
    /// Store failures are absorbed by the fallback chain: the configured mode,
    /// then HINTS, then key attributes only, then an empty map. An error is
    /// returned only when the fallback path itself hits a non-recoverable
    /// failure, wrapped as [`KeyqlError::Discovery`].
    #[tracing::instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id, mode = %self.config.mode))]
    pub async fn detect_column_metadata(
        &self,
        table: &str,
        ctx: DiscoveryContext,
    ) -> Result<Traced<ColumnMap>> {
        if let Some(columns) = self.memo.get(table) {
            tracing::debug!(table = %table, "column metadata served from memo");
            return Ok(Traced::new(columns, ctx));
        }
        let columns = self.discover(table).await?;
        Ok(Traced::new(columns, ctx))
    }

    /// Discover `table` again, ignoring and replacing any memoized result
    #[tracing::instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id, mode = %self.config.mode))]
    pub async fn rediscover(&self, table: &str, ctx: DiscoveryContext) -> Result<Traced<ColumnMap>> {
        self.memo.remove(table);
        let columns = self.discover(table).await?;
        Ok(Traced::new(columns, ctx))
    }

    /// Column name to relational type code, derived from the column metadata
    pub async fn detect_schema(
        &self,
        table: &str,
        ctx: DiscoveryContext,
    ) -> Result<Traced<HashMap<String, i32>>> {
        let traced = self.detect_column_metadata(table, ctx).await?;
        Ok(traced.map(|columns| type_codes(&columns)))
    }

    /// Key layout of `table` for presentation ordering
    pub async fn table_key_info(&self, table: &str) -> Result<TableKeyInfo> {
        let description = self.store.describe_table(table).await?;
        Ok(TableKeyInfo::from_description(&description))
    }

    async fn discover(&self, table: &str) -> Result<ColumnMap> {
        let mode = self.config.mode;
        match self.run_mode(mode, table).await {
            Ok(columns) => {
                tracing::debug!(table = %table, columns = columns.len(), "discovery succeeded");
                self.memo.insert(table, columns.clone());
                Ok(columns)
            }
            Err(error) => {
                tracing::warn!(table = %table, mode = %mode, error = %error, "discovery failed, falling back");
                self.fallback(table, mode)
                    .await
                    .map_err(|source| KeyqlError::discovery(table, source))
            }
        }
    }

    async fn run_mode(&self, mode: DiscoveryMode, table: &str) -> Result<ColumnMap> {
        match mode {
            DiscoveryMode::Disabled => self.key_attributes_only(table).await,
            DiscoveryMode::Hints => self.hints(table).await,
            DiscoveryMode::Sampling => self.sampling(table).await,
            DiscoveryMode::Auto => self.auto(table).await,
        }
    }

    async fn fallback(&self, table: &str, failed: DiscoveryMode) -> Result<ColumnMap> {
        if failed != DiscoveryMode::Hints {
            match self.hints(table).await {
                Ok(columns) => return Ok(columns),
                Err(error) if error.is_recoverable() => {
                    tracing::warn!(table = %table, error = %error, "hints fallback failed, using key attributes only");
                }
                Err(error) => return Err(error),
            }
        }

        match self.key_attributes_only(table).await {
            Ok(columns) => Ok(columns),
            Err(error) if error.is_recoverable() => {
                tracing::warn!(table = %table, error = %error, "key attribute fallback failed, returning empty metadata");
                Ok(ColumnMap::new())
            }
            Err(error) => Err(error),
        }
    }

    async fn key_attributes_only(&self, table: &str) -> Result<ColumnMap> {
        let description = self.store.describe_table(table).await?;
        Ok(key_columns(&description))
    }

    async fn hints(&self, table: &str) -> Result<ColumnMap> {
        let description = self.store.describe_table(table).await?;
        self.hints_with(&description).await
    }

    async fn hints_with(&self, description: &TableDescription) -> Result<ColumnMap> {
        let table = description.table_name.as_str();
        let mut columns = key_columns(description);
        let sample_size = hints_sample_size(self.config.sample_size);
        let items = self.sampler.sample(table, sample_size).await?;
        columns.extend(profile_items(table, &items, DiscoverySource::Hints));
        Ok(columns)
    }

    async fn sampling(&self, table: &str) -> Result<ColumnMap> {
        let items = self.sampler.sample(table, self.config.sample_size).await?;
        Ok(profile_items(table, &items, DiscoverySource::Sampling))
    }

    async fn auto(&self, table: &str) -> Result<ColumnMap> {
        let description = self.store.describe_table(table).await?;
        if !description.status.is_ready() {
            tracing::debug!(table = %table, status = ?description.status, "table not ready, degrading to hints");
            return self.hints_with(&description).await;
        }

        let sample_size = self
            .config
            .auto_tuning
            .sample_size(self.config.sample_size, description.has_secondary_indexes());
        tracing::debug!(
            table = %table,
            sample_size,
            indexes = description.secondary_index_count(),
            "auto mode sampling"
        );
        let items = self.sampler.sample(table, sample_size).await?;
        Ok(profile_items(table, &items, DiscoverySource::Auto))
    }
}

/// Key-only metadata from the declared key schema.
///
/// A key attribute without a declared type is still listed, as `Other`.
fn key_columns(description: &TableDescription) -> ColumnMap {
    description
        .key_schema
        .iter()
        .map(|key| {
            let category = match description.attribute_definitions.get(&key.attribute_name) {
                Some(declared) => declared.category(),
                None => {
                    tracing::debug!(
                        table = %description.table_name,
                        attribute = %key.attribute_name,
                        "key attribute has no declared type"
                    );
                    TypeCategory::Other
                }
            };
            (
                key.attribute_name.clone(),
                ColumnMetadata::key_attribute(&description.table_name, &key.attribute_name, category),
            )
        })
        .collect()
}
