//! Bounded item sampling against the store

use keyql_core::config::{ITEMS_PER_SEGMENT, MAX_TOTAL_SEGMENTS};
use keyql_core::{Item, Result, SampleStrategy, ScanRequest, StoreClient};
use rand::Rng;
use std::sync::Arc;

/// Number of parallel-scan segments used for a random sample of `sample_size` items.
pub fn total_segments_for(sample_size: usize) -> u32 {
    let segments = sample_size.div_ceil(ITEMS_PER_SEGMENT).max(1);
    u32::try_from(segments)
        .unwrap_or(MAX_TOTAL_SEGMENTS)
        .min(MAX_TOTAL_SEGMENTS)
}

/// Reads a bounded sample of items from one table
pub struct SamplingEngine {
    store: Arc<dyn StoreClient>,
    strategy: SampleStrategy,
}

impl SamplingEngine {
    pub fn new(store: Arc<dyn StoreClient>, strategy: SampleStrategy) -> Self {
        Self { store, strategy }
    }

    pub fn strategy(&self) -> SampleStrategy {
        self.strategy
    }

    /// Sample up to roughly `sample_size` items.
    ///
    /// Pages are fetched until the quota is reached or the scan is exhausted.
    /// The last page is kept whole, so the result may overshoot the quota.
    /// An empty table yields an empty sample.
    #[tracing::instrument(skip(self), fields(strategy = %self.strategy))]
    pub async fn sample(&self, table: &str, sample_size: usize) -> Result<Vec<Item>> {
        let quota = sample_size.max(1);
        let base = match self.strategy {
            SampleStrategy::Random => {
                let total = total_segments_for(quota);
                let segment = rand::thread_rng().gen_range(0..total);
                tracing::debug!(segment, total, "sampling one random segment");
                ScanRequest::new(table).with_segment(segment, total)
            }
            // The store exposes no recency ordering, so RECENT reads from the start too
            SampleStrategy::Sequential | SampleStrategy::Recent => ScanRequest::new(table),
        };

        let mut items: Vec<Item> = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let request = base.clone().with_limit(quota).with_start_token(token.take());
            let page = self.store.scan(request).await?;
            pages += 1;
            items.extend(page.items);

            if items.len() >= quota {
                break;
            }
            match page.continuation {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        tracing::debug!(items = items.len(), pages, quota, "sample complete");
        Ok(items)
    }
}
