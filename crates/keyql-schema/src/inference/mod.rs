//! Type inference over sampled items
//!
//! Sampling reads a bounded number of items from the store, profiling turns
//! them into per-column type histograms, and resolution collapses each
//! histogram to a single relational category.

mod resolver;
mod sampling;


pub use resolver::{RESOLUTION_PRIORITY, profile_items, resolve_type};
pub use sampling::{SamplingEngine, total_segments_for};
