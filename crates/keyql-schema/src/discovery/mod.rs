//! Schema discovery for a single table
//!
//! The detector runs one of the discovery modes against the store, falls back
//! through HINTS and key-only metadata when the chosen mode fails, and
//! memoizes successful primary-mode results.

mod detector;
mod memo;

#[cfg(test)]
mod tests;

pub use detector::SchemaDetector;
pub use memo::DiscoveryMemo;
