//! In-memory store scaffolding for unit tests in this crate
//!
//! `MockStore` serves scans out of a vector of items, paging with a numeric
//! continuation token and honouring segment/limit requests, and records
//! every request it sees.

use async_trait::async_trait;
use keyql_core::{
    AttributeValue, Item, KeyqlError, Result, ScanPage, ScanRequest, StoreClient,
    TableDescription,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn item(pairs: &[(&str, AttributeValue)]) -> Item {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

pub fn s(value: &str) -> AttributeValue {
    AttributeValue::S(value.to_string())
}

pub fn n(value: i64) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

struct MockTable {
    description: TableDescription,
    items: Vec<Item>,
}

pub struct MockStore {
    tables: Mutex<HashMap<String, MockTable>>,
    page_size: usize,
    scan_delay: Option<Duration>,
    scan_failure: Option<fn() -> KeyqlError>,
    failing_scans: AtomicUsize,
    describe_failure: Option<fn() -> KeyqlError>,
    scan_log: Mutex<Vec<ScanRequest>>,
    describe_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            page_size: 1000,
            scan_delay: None,
            scan_failure: None,
            failing_scans: AtomicUsize::new(0),
            describe_failure: None,
            scan_log: Mutex::new(Vec::new()),
            describe_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_table(self, description: TableDescription, items: Vec<Item>) -> Self {
        self.tables.lock().insert(
            description.table_name.clone(),
            MockTable { description, items },
        );
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_scan_delay(mut self, delay: Duration) -> Self {
        self.scan_delay = Some(delay);
        self
    }

    /// Every scan fails
    pub fn with_scan_failure(self, failure: fn() -> KeyqlError) -> Self {
        self.with_scan_failures(usize::MAX, failure)
    }

    /// The first `count` scans fail, later ones succeed
    pub fn with_scan_failures(mut self, count: usize, failure: fn() -> KeyqlError) -> Self {
        self.scan_failure = Some(failure);
        self.failing_scans = AtomicUsize::new(count);
        self
    }

    pub fn with_describe_failure(mut self, failure: fn() -> KeyqlError) -> Self {
        self.describe_failure = Some(failure);
        self
    }

    pub fn scan_log(&self) -> Vec<ScanRequest> {
        self.scan_log.lock().clone()
    }

    pub fn scan_count(&self) -> usize {
        self.scan_log.lock().len()
    }

    pub fn describe_count(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }

    /// Highest number of scans that were running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreClient for MockStore {
    async fn scan(&self, request: ScanRequest) -> Result<ScanPage> {
        self.scan_log.lock().push(request.clone());
        if let Some(delay) = self.scan_delay {
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        if let Some(failure) = self.scan_failure {
            let failed = self
                .failing_scans
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if failed {
                return Err(failure());
            }
        }

        let tables = self.tables.lock();
        let table = tables
            .get(&request.table)
            .ok_or_else(|| KeyqlError::TableNotFound(request.table.clone()))?;

        let visible: Vec<&Item> = match request.segment {
            Some(seg) => table
                .items
                .iter()
                .enumerate()
                .filter(|(i, _)| *i as u32 % seg.total_segments == seg.segment)
                .map(|(_, item)| item)
                .collect(),
            None => table.items.iter().collect(),
        };

        let start = request
            .start_token
            .as_deref()
            .and_then(|t| t.parse::<usize>().ok())
            .unwrap_or(0)
            .min(visible.len());
        let limit = request.limit.unwrap_or(self.page_size).min(self.page_size);
        let end = (start + limit).min(visible.len());
        let items = visible[start..end].iter().map(|i| (*i).clone()).collect();
        let continuation = (end < visible.len()).then(|| end.to_string());

        Ok(ScanPage::new(items, continuation))
    }

    async fn describe_table(&self, table: &str) -> Result<TableDescription> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.describe_failure {
            return Err(failure());
        }
        self.tables
            .lock()
            .get(table)
            .map(|t| t.description.clone())
            .ok_or_else(|| KeyqlError::TableNotFound(table.to_string()))
    }
}
