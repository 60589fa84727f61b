//! Adaptive Cache - An in-memory cache for query results and computed artifacts
//!
//! Bounds memory by bytes and keys, expires stale entries, evicts by
//! recency, compresses large payloads and supports tag/pattern invalidation.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{QueryCache, WarmupEntry, WarmupReport};
pub use config::{CacheConfig, CacheConfigUpdate, Config};
pub use error::{CacheError, Result};
