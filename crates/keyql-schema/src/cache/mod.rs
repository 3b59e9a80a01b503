//! TTL schema cache with single-flight refresh

mod entry;
mod schema_cache;


pub use entry::{CachedSchemaEntry, EntrySnapshot, RefreshGuard};
pub use schema_cache::{SchemaCache, SchemaCacheStats};
