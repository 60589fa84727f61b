//! Cache Module
//!
//! Provides in-memory caching with TTL expiration, LRU eviction under byte and
//! key budgets, transparent compression and tag/pattern invalidation.

pub mod codec;
mod entry;
mod events;
mod lru;
mod manager;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use codec::Payload;
pub use entry::{current_timestamp_ms, CacheEntry, EntryInfo, KeyListing};
pub use events::{CacheEvent, EventPublisher, EvictionReason};
pub use lru::LruTracker;
pub use manager::{generate_query_key, memo_key, QueryCache, WarmupEntry, WarmupReport};
pub use stats::{format_size, CacheStats, KeyAccess, MetricsSnapshot, LATENCY_WINDOW};
pub use store::CacheStore;

// == Public Constants ==
/// Number of keys reported in `MetricsSnapshot::top_keys`
pub const TOP_KEYS_LIMIT: usize = 10;

/// Default row limit for `list_keys`
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Tags applied to entries stored through `cached_query`
pub const QUERY_TAGS: [&str; 2] = ["database", "query"];

/// Tag applied to entries stored by `warmup`
pub const WARMUP_TAG: &str = "warmup";
