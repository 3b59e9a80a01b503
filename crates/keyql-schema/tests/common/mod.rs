//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use keyql_core::{
    AttributeValue, IndexKind, Item, KeyElement, KeyqlError, Result, ScalarAttributeType, ScanPage,
    ScanRequest, StoreClient, TableDescription,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Mock store for exercising discovery end to end without a real backend.
///
/// Tables are served from memory in a single page. Scans and describes can
/// be made to fail independently, and every call is logged as
/// `"scan <table>"` / `"describe <table>"`.
pub struct MockStore {
    pub tables: HashMap<String, (TableDescription, Vec<Item>)>,
    pub fail_scans: bool,
    pub fail_describe: bool,
    /// Log of all store calls, for assertion in tests
    pub call_log: Arc<parking_lot::Mutex<Vec<String>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            fail_scans: false,
            fail_describe: false,
            call_log: Arc::new(parking_lot::Mutex::new(Vec::new())),
        }
    }

    pub fn with_table(mut self, description: TableDescription, items: Vec<Item>) -> Self {
        self.tables
            .insert(description.table_name.clone(), (description, items));
        self
    }

    pub fn with_scan_failure(mut self) -> Self {
        self.fail_scans = true;
        self
    }

    pub fn with_describe_failure(mut self) -> Self {
        self.fail_describe = true;
        self
    }

    pub fn call_log(&self) -> Vec<String> {
        self.call_log.lock().clone()
    }

    pub fn scans_of(&self, table: &str) -> usize {
        let needle = format!("scan {table}");
        self.call_log.lock().iter().filter(|c| **c == needle).count()
    }
}

#[async_trait]
impl StoreClient for MockStore {
    async fn scan(&self, request: ScanRequest) -> Result<ScanPage> {
        self.call_log.lock().push(format!("scan {}", request.table));
        if self.fail_scans {
            return Err(KeyqlError::Store("scan throttled".to_string()));
        }
        let (_, items) = self
            .tables
            .get(&request.table)
            .ok_or_else(|| KeyqlError::TableNotFound(request.table.clone()))?;
        let limit = request.limit.unwrap_or(items.len());
        Ok(ScanPage::new(items.iter().take(limit).cloned().collect(), None))
    }

    async fn describe_table(&self, table: &str) -> Result<TableDescription> {
        self.call_log.lock().push(format!("describe {table}"));
        if self.fail_describe {
            return Err(KeyqlError::Store("describe unavailable".to_string()));
        }
        self.tables
            .get(table)
            .map(|(description, _)| description.clone())
            .ok_or_else(|| KeyqlError::TableNotFound(table.to_string()))
    }
}

pub fn row(pairs: &[(&str, AttributeValue)]) -> Item {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// `orders(customer_id S, order_id N)` with a status index and mixed-type rows
pub fn orders_table() -> (TableDescription, Vec<Item>) {
    let description = TableDescription::new("orders")
        .with_hash_key("customer_id", ScalarAttributeType::S)
        .with_range_key("order_id", ScalarAttributeType::N)
        .with_index(
            "by_status",
            IndexKind::Global,
            vec![(KeyElement::hash("status"), ScalarAttributeType::S)],
        );

    let items = vec![
        row(&[
            ("customer_id", AttributeValue::S("c1".into())),
            ("order_id", AttributeValue::N("1".into())),
            ("status", AttributeValue::S("open".into())),
            ("total", AttributeValue::N("12.50".into())),
        ]),
        row(&[
            ("customer_id", AttributeValue::S("c2".into())),
            ("order_id", AttributeValue::N("2".into())),
            ("status", AttributeValue::S("closed".into())),
            ("total", AttributeValue::S("n/a".into())),
            ("gift", AttributeValue::Bool(true)),
        ]),
        row(&[
            ("customer_id", AttributeValue::S("c3".into())),
            ("order_id", AttributeValue::N("3".into())),
            ("status", AttributeValue::Null),
            ("total", AttributeValue::N("7".into())),
        ]),
    ];

    (description, items)
}

/// A table with a single numeric hash key and a couple of rows
pub fn simple_table(name: &str) -> (TableDescription, Vec<Item>) {
    let description = TableDescription::new(name).with_hash_key("id", ScalarAttributeType::N);
    let items = (0..3)
        .map(|i| {
            row(&[
                ("id", AttributeValue::N(i.to_string())),
                ("name", AttributeValue::S(format!("{name}-{i}"))),
            ])
        })
        .collect();
    (description, items)
}

pub fn store_with_tables(names: &[&str]) -> MockStore {
    names.iter().fold(MockStore::new(), |store, name| {
        let (description, items) = simple_table(name);
        store.with_table(description, items)
    })
}
