//! Offset to continuation token checkpoints

mod token_cache;


pub use token_cache::{OffsetCacheStats, OffsetTokenCache, ResumePoint, TokenEntry, normalize_pattern};
