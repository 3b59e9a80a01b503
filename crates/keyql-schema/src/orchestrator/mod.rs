//! Multi-table discovery and the cache lookup path
//!
//! [`DiscoveryOrchestrator`] and [`OnDemandLoader`] are the contracts the
//! preloader drives; [`SchemaDiscoveryService`] implements both on top of a
//! detector and a schema cache.

mod contract;
mod service;

#[cfg(test)]
mod tests;

pub use contract::{DiscoveryOrchestrator, OnDemandLoader};
pub use service::SchemaDiscoveryService;
