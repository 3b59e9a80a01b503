//! keyql Query - Support for paginated result retrieval
//!
//! The backing store only pages forward with opaque continuation tokens.
//! `OffsetTokenCache` remembers tokens at fixed offsets so that a reader
//! asked for row N can resume from the closest checkpoint instead of
//! paging from the start.

pub mod pagination;

pub use pagination::{OffsetCacheStats, OffsetTokenCache, ResumePoint, TokenEntry, normalize_pattern};
