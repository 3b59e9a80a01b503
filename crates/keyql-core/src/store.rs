//! Backing-store client interface
//!
//! keyql never talks to the store wire protocol itself. Everything it needs
//! is a bounded scan and a table description, provided by an implementation
//! of [`StoreClient`].

use crate::{Item, Result, TypeCategory};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Client for the schemaless backing store
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Run one page of a (possibly segmented, possibly limited) scan
    async fn scan(&self, request: ScanRequest) -> Result<ScanPage>;

    /// Describe a table's declared key schema, indexes and status
    async fn describe_table(&self, table: &str) -> Result<TableDescription>;
}

/// Parallel-scan partition selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSegment {
    pub segment: u32,
    pub total_segments: u32,
}

/// One page request of a bounded scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub table: String,
    pub segment: Option<ScanSegment>,
    /// Row limit for the page
    pub limit: Option<usize>,
    /// Continuation token from the previous page
    pub start_token: Option<String>,
}

impl ScanRequest {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            segment: None,
            limit: None,
            start_token: None,
        }
    }

    pub fn with_segment(mut self, segment: u32, total_segments: u32) -> Self {
        self.segment = Some(ScanSegment {
            segment,
            total_segments,
        });
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_start_token(mut self, token: Option<String>) -> Self {
        self.start_token = token;
        self
    }
}

/// One page of scan results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPage {
    pub items: Vec<Item>,
    /// Opaque continuation token; `None` when the scan is exhausted
    pub continuation: Option<String>,
}

impl ScanPage {
    pub fn new(items: Vec<Item>, continuation: Option<String>) -> Self {
        Self {
            items,
            continuation,
        }
    }
}

/// Role of a key attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyRole {
    /// Partition key
    Hash,
    /// Sort key
    Range,
}

/// Scalar types a key attribute may be declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarAttributeType {
    S,
    N,
    B,
}

impl ScalarAttributeType {
    pub fn category(&self) -> TypeCategory {
        match self {
            ScalarAttributeType::S => TypeCategory::String,
            ScalarAttributeType::N => TypeCategory::Number,
            ScalarAttributeType::B => TypeCategory::Binary,
        }
    }
}

/// One element of a key schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyElement {
    pub attribute_name: String,
    pub role: KeyRole,
}

impl KeyElement {
    pub fn hash(name: impl Into<String>) -> Self {
        Self {
            attribute_name: name.into(),
            role: KeyRole::Hash,
        }
    }

    pub fn range(name: impl Into<String>) -> Self {
        Self {
            attribute_name: name.into(),
            role: KeyRole::Range,
        }
    }
}

/// Kind of secondary index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    Global,
    Local,
}

/// Secondary index declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryIndex {
    pub name: String,
    pub kind: IndexKind,
    pub key_schema: Vec<KeyElement>,
}

/// Lifecycle status of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableStatus {
    Creating,
    Updating,
    Deleting,
    Active,
    Archiving,
    Archived,
}

impl TableStatus {
    /// Whether the table can serve scans
    pub fn is_ready(&self) -> bool {
        matches!(self, TableStatus::Active)
    }
}

/// Result of describing a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescription {
    pub table_name: String,
    /// Table key schema, hash key first
    pub key_schema: Vec<KeyElement>,
    /// Declared types of key attributes (table and index keys)
    pub attribute_definitions: HashMap<String, ScalarAttributeType>,
    pub secondary_indexes: Vec<SecondaryIndex>,
    pub status: TableStatus,
}

impl TableDescription {
    /// Create an active table description with no indexes
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            key_schema: Vec::new(),
            attribute_definitions: HashMap::new(),
            secondary_indexes: Vec::new(),
            status: TableStatus::Active,
        }
    }

    pub fn with_hash_key(mut self, name: impl Into<String>, ty: ScalarAttributeType) -> Self {
        let name = name.into();
        self.attribute_definitions.insert(name.clone(), ty);
        self.key_schema.push(KeyElement::hash(name));
        self
    }

    pub fn with_range_key(mut self, name: impl Into<String>, ty: ScalarAttributeType) -> Self {
        let name = name.into();
        self.attribute_definitions.insert(name.clone(), ty);
        self.key_schema.push(KeyElement::range(name));
        self
    }

    /// Add a secondary index; its key attributes are added to the attribute definitions
    pub fn with_index(
        mut self,
        name: impl Into<String>,
        kind: IndexKind,
        keys: Vec<(KeyElement, ScalarAttributeType)>,
    ) -> Self {
        let mut key_schema = Vec::with_capacity(keys.len());
        for (element, ty) in keys {
            self.attribute_definitions
                .insert(element.attribute_name.clone(), ty);
            key_schema.push(element);
        }
        self.secondary_indexes.push(SecondaryIndex {
            name: name.into(),
            kind,
            key_schema,
        });
        self
    }

    pub fn with_status(mut self, status: TableStatus) -> Self {
        self.status = status;
        self
    }

    pub fn has_secondary_indexes(&self) -> bool {
        !self.secondary_indexes.is_empty()
    }

    pub fn secondary_index_count(&self) -> usize {
        self.secondary_indexes.len()
    }

    pub fn hash_key(&self) -> Option<&str> {
        self.key_schema
            .iter()
            .find(|k| k.role == KeyRole::Hash)
            .map(|k| k.attribute_name.as_str())
    }

    pub fn range_key(&self) -> Option<&str> {
        self.key_schema
            .iter()
            .find(|k| k.role == KeyRole::Range)
            .map(|k| k.attribute_name.as_str())
    }
}
