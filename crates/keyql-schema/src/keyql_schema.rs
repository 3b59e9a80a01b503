//! keyql Schema - Schema inference, caching and preloading
//!
//! This crate provides:
//! - Type inference over bounded samples of a schemaless table
//! - Mode-based discovery with a fallback chain (`SchemaDetector`)
//! - A TTL schema cache with single-flight refresh (`SchemaCache`)
//! - Concurrent multi-table discovery (`SchemaDiscoveryService`)
//! - Proactive cache warming (`PreloadManager`)

pub mod cache;
pub mod discovery;
pub mod inference;
mod metadata;
pub mod orchestrator;
pub mod preload;

#[cfg(test)]
mod test_helpers;

pub use metadata::{
    ColumnMap, ColumnMetadata, DiscoverySource, TableKeyInfo, TypeHistogram, type_codes,
};

// Re-export cache types for convenience
pub use cache::{CachedSchemaEntry, EntrySnapshot, RefreshGuard, SchemaCache, SchemaCacheStats};

pub use discovery::{DiscoveryMemo, SchemaDetector};

pub use inference::{SamplingEngine, profile_items, resolve_type, total_segments_for};

pub use orchestrator::{DiscoveryOrchestrator, OnDemandLoader, SchemaDiscoveryService};

// Re-export preload types for convenience
pub use preload::{AccessEvent, AccessPatternRecorder, PreloadManager, PreloadReport, PreloadStats};
