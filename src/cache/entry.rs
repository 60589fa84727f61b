//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL and access metadata.

use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::cache::codec::Payload;

// == Cache Entry ==
/// Represents a single cache entry: the stored payload plus its metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The key this entry is stored under
    pub key: String,
    /// Serialized (possibly compressed) value
    pub payload: Vec<u8>,
    /// Whether `payload` must be decompressed before decoding
    pub compressed: bool,
    /// Time to live in milliseconds
    pub ttl_ms: u64,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Timestamp of the most recent hit (Unix milliseconds)
    pub last_accessed: u64,
    /// Number of hits since creation
    pub access_count: u64,
    /// Labels for group invalidation
    pub tags: BTreeSet<String>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    pub fn new(key: String, payload: Payload, ttl_ms: u64, tags: BTreeSet<String>) -> Self {
        let now = current_timestamp_ms();
        Self {
            key,
            payload: payload.bytes,
            compressed: payload.compressed,
            ttl_ms,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            tags,
        }
    }

    // == Size ==
    /// Byte size of the stored representation.
    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }

    // == Expires At ==
    pub fn expires_at(&self) -> u64 {
        self.created_at.saturating_add(self.ttl_ms)
    }

    // == Is Expired ==
    /// Checks whether the entry is stale at `now`.
    ///
    /// An entry stays readable through the instant `created_at + ttl` and
    /// expires strictly after it.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now > self.expires_at()
    }

    /// Checks whether the entry is stale at the current time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Records a hit at `now`.
    pub fn touch(&mut self, now: u64) {
        self.last_accessed = now;
        self.access_count += 1;
    }

    /// Returns true if any of the entry's tags is in `tags`.
    pub fn has_any_tag(&self, tags: &[&str]) -> bool {
        tags.iter().any(|t| self.tags.contains(*t))
    }

    /// Key namespace: the text before the first `:`.
    pub fn namespace(&self) -> &str {
        match self.key.split(':').next() {
            Some(ns) if !ns.is_empty() => ns,
            _ => "unknown",
        }
    }

    /// Metadata copy for introspection.
    pub fn info(&self) -> EntryInfo {
        EntryInfo {
            key: self.key.clone(),
            ttl_ms: self.ttl_ms,
            created_at: self.created_at,
            last_accessed: self.last_accessed,
            access_count: self.access_count,
            size: self.size(),
            compressed: self.compressed,
            tags: self.tags.iter().cloned().collect(),
        }
    }
}

// == Entry Info ==
/// Detailed metadata for a single key, without its payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryInfo {
    pub key: String,
    pub ttl_ms: u64,
    pub created_at: u64,
    pub last_accessed: u64,
    pub access_count: u64,
    pub size: u64,
    pub compressed: bool,
    pub tags: Vec<String>,
}

// == Key Listing ==
/// One row of `list_keys` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyListing {
    pub key: String,
    pub size: u64,
    pub ttl_ms: u64,
    /// Milliseconds since creation
    pub age_ms: u64,
    pub access_count: u64,
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
