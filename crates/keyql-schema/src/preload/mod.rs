//! Schema preloading strategies

mod manager;
mod pattern;


pub use manager::{PreloadManager, PreloadReport, PreloadStats};
pub use pattern::{AccessEvent, AccessPatternRecorder, DEFAULT_ACCESS_LOG_CAPACITY};
