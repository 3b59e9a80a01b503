//! Histogram profiling and type resolution

use keyql_core::{Item, TypeCategory};
use std::collections::HashMap;

use crate::metadata::{ColumnMap, ColumnMetadata, DiscoverySource, TypeHistogram};

/// Categories a column resolves to, most preferred first.
///
/// `Null` is absent: it only wins when nothing else was observed.
pub const RESOLUTION_PRIORITY: [TypeCategory; 7] = [
    TypeCategory::String,
    TypeCategory::Number,
    TypeCategory::Binary,
    TypeCategory::Boolean,
    TypeCategory::Struct,
    TypeCategory::Array,
    TypeCategory::Other,
];

/// Collapse a histogram to one category.
///
/// Priority order is fixed, frequency does not matter and zero counts are
/// ignored. A histogram holding only NULLs resolves to `Null`; an empty one
/// to `Other`.
pub fn resolve_type(histogram: &TypeHistogram) -> TypeCategory {
    let observed = |category: &TypeCategory| histogram.get(category).is_some_and(|c| *c > 0);

    if let Some(category) = RESOLUTION_PRIORITY.iter().find(|c| observed(c)) {
        return *category;
    }
    if observed(&TypeCategory::Null) {
        return TypeCategory::Null;
    }
    TypeCategory::Other
}

/// Build column metadata from sampled items.
///
/// A column is nullable when a NULL was seen or when some item lacks the
/// attribute altogether.
pub fn profile_items(table: &str, items: &[Item], source: DiscoverySource) -> ColumnMap {
    let mut histograms: HashMap<&str, (TypeHistogram, usize)> = HashMap::new();

    for item in items {
        for (name, value) in item {
            let (histogram, present) = histograms.entry(name.as_str()).or_default();
            *histogram.entry(value.category()).or_insert(0) += 1;
            *present += 1;
        }
    }

    histograms
        .into_iter()
        .map(|(name, (histogram, present))| {
            let nullable = present < items.len()
                || histogram
                    .get(&TypeCategory::Null)
                    .is_some_and(|c| *c > 0);
            (
                name.to_string(),
                ColumnMetadata::from_histogram(table, name, histogram, nullable, source),
            )
        })
        .collect()
}
