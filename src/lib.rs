//! Geodemo - adaptive spatial caching for demographic map data
//!
//! This library fetches geospatial demographic features for a map viewport
//! and date while minimizing network traffic. A query region is resolved to
//! a set of spatial cells at an adaptively chosen resolution, each cell is
//! looked up in a local cache (including negative entries for cells known
//! to hold no data), and only the remaining unknown cells are fetched from
//! the network in cancellable batches.
//!
//! # High-Level API
//!
//! The [`client`] module provides the facade that wires all components:
//!
//! ```ignore
//! use std::sync::Arc;
//! use geodemo::client::{GeodemoClient, GetDataQuery};
//! use geodemo::cache::MemoryFeatureCache;
//! use geodemo::config::ClientConfig;
//! use geodemo::hooks::Hooks;
//! use geodemo::strategy::QueryRegion;
//!
//! let config = ClientConfig::new("https://api.example.com");
//! let cache = Arc::new(MemoryFeatureCache::new());
//! let client = GeodemoClient::connect_http(config, tessellation, cache, Hooks::new()).await?;
//!
//! let collection = client
//!     .get_data(GetDataQuery::point(39.0977, -94.5786, 0.5))
//!     .await?;
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod feature;
pub mod fetch;
pub mod hooks;
pub mod logging;
pub mod progress;
pub mod scanner;
pub mod strategy;
pub mod tessellation;

/// Version of the geodemo library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
