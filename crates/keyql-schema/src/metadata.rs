//! Per-column metadata and key ordering for relational presentation

use keyql_core::{KeyRole, TableDescription, TypeCategory};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::inference::resolve_type;

/// Observed value categories of one column with occurrence counts
pub type TypeHistogram = BTreeMap<TypeCategory, u64>;

/// Column name to metadata for one table
pub type ColumnMap = HashMap<String, ColumnMetadata>;

/// Where a column's metadata came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscoverySource {
    /// Declared key attribute, no sampling involved
    KeySchema,
    /// Light sample taken by HINTS mode
    Hints,
    /// Full sample taken by SAMPLING mode
    Sampling,
    /// Sample sized by AUTO mode
    Auto,
}

/// Inferred metadata for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub table_name: String,
    pub column_name: String,
    pub type_histogram: TypeHistogram,
    /// Always one of the observed categories, `Other` if nothing was observed,
    /// or `Null` if only NULLs were observed
    pub resolved_type: TypeCategory,
    /// A NULL was observed, or the attribute was missing from some sampled item
    pub nullable: bool,
    pub source: DiscoverySource,
}

impl ColumnMetadata {
    /// Build metadata from an observed histogram, resolving the column type
    pub fn from_histogram(
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        type_histogram: TypeHistogram,
        nullable: bool,
        source: DiscoverySource,
    ) -> Self {
        let resolved_type = resolve_type(&type_histogram);
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            type_histogram,
            resolved_type,
            nullable,
            source,
        }
    }

    /// Metadata for a declared key attribute. The declaration counts as one observation.
    pub fn key_attribute(
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        category: TypeCategory,
    ) -> Self {
        Self::from_histogram(
            table_name,
            column_name,
            BTreeMap::from([(category, 1)]),
            false,
            DiscoverySource::KeySchema,
        )
    }

    pub fn sql_type_code(&self) -> i32 {
        self.resolved_type.sql_type_code()
    }

    pub fn sql_type_name(&self) -> &'static str {
        self.resolved_type.sql_type_name()
    }

    /// Total number of observations across all categories
    pub fn observations(&self) -> u64 {
        self.type_histogram.values().sum()
    }

    /// Whether values of more than one non-null category were observed
    pub fn has_type_conflict(&self) -> bool {
        self.type_histogram
            .iter()
            .filter(|(category, count)| **category != TypeCategory::Null && **count > 0)
            .count()
            > 1
    }
}

/// Derive the raw column → SQL type code view of a column map
pub fn type_codes(columns: &ColumnMap) -> HashMap<String, i32> {
    columns
        .iter()
        .map(|(name, meta)| (name.clone(), meta.sql_type_code()))
        .collect()
}

/// Key layout of a table, used only to order columns for presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableKeyInfo {
    table_name: String,
    primary_keys: Vec<String>,
    secondary_keys: Vec<String>,
}

impl TableKeyInfo {
    pub fn new(
        table_name: impl Into<String>,
        primary_keys: Vec<String>,
        secondary_keys: Vec<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            primary_keys,
            secondary_keys,
        }
    }

    /// Primary keys are hash then range; secondary keys follow index order,
    /// skipping duplicates and attributes that are already primary keys.
    pub fn from_description(description: &TableDescription) -> Self {
        let mut primary_keys = Vec::with_capacity(2);
        for role in [KeyRole::Hash, KeyRole::Range] {
            primary_keys.extend(
                description
                    .key_schema
                    .iter()
                    .filter(|k| k.role == role)
                    .map(|k| k.attribute_name.clone()),
            );
        }

        let mut secondary_keys: Vec<String> = Vec::new();
        for index in &description.secondary_indexes {
            for element in &index.key_schema {
                let name = &element.attribute_name;
                if !primary_keys.contains(name) && !secondary_keys.contains(name) {
                    secondary_keys.push(name.clone());
                }
            }
        }

        Self {
            table_name: description.table_name.clone(),
            primary_keys,
            secondary_keys,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    pub fn secondary_keys(&self) -> &[String] {
        &self.secondary_keys
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_keys.iter().any(|k| k == column)
    }

    pub fn is_secondary_key(&self, column: &str) -> bool {
        self.secondary_keys.iter().any(|k| k == column)
    }

    /// Position of a key column in presentation order, `None` for non-key columns
    pub fn key_position(&self, column: &str) -> Option<usize> {
        self.primary_keys
            .iter()
            .position(|k| k == column)
            .or_else(|| {
                self.secondary_keys
                    .iter()
                    .position(|k| k == column)
                    .map(|p| p + self.primary_keys.len())
            })
    }

    /// Order columns for catalog output: primary keys, secondary keys, then the rest by name
    pub fn order_columns<I>(&self, columns: I) -> Vec<ColumnMetadata>
    where
        I: IntoIterator<Item = ColumnMetadata>,
    {
        let mut ordered: Vec<ColumnMetadata> = columns.into_iter().collect();
        ordered.sort_by(|a, b| {
            let rank_a = self.key_position(&a.column_name).unwrap_or(usize::MAX);
            let rank_b = self.key_position(&b.column_name).unwrap_or(usize::MAX);
            rank_a
                .cmp(&rank_b)
                .then_with(|| a.column_name.cmp(&b.column_name))
        });
        ordered
    }
}
