//! keyql Core - Core abstractions for a relational view over schemaless stores
//!
//! This crate provides the fundamental traits and types that the other
//! keyql crates depend on. It defines:
//!
//! - `StoreClient` - Trait for the backing store (bounded scans, table description)
//! - `AttributeValue` / `TypeCategory` - Store values and the relational categories they map to
//! - `KeyqlConfig` - The immutable configuration snapshot
//! - `Clock` - Time source for every TTL-bearing structure
//! - `DiscoveryContext` - Explicit correlation context for top-level calls

mod clock;
pub mod config;
mod context;
mod error;
mod store;
mod types;


pub use clock::*;
pub use config::{
    AutoModeTuning, DiscoveryConfig, DiscoveryMode, KeyqlConfig, OffsetCacheConfig,
    PreloadConfig, PreloadStrategy, SampleStrategy, SchemaCacheConfig, hints_sample_size,
    parse_sample_size,
};
pub use context::*;
pub use error::*;
pub use store::*;
pub use types::*;
