//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with LRU tracking, TTL
//! expiration, size accounting and admission control.
//!
//! `CacheStore` is single-owner (`&mut self`); `QueryCache` wraps it in a
//! lock for shared use.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::cache::codec::{self, Payload};
use crate::cache::entry::{current_timestamp_ms, CacheEntry, EntryInfo, KeyListing};
use crate::cache::events::{CacheEvent, EventPublisher, EvictionReason};
use crate::cache::stats::{format_size, CacheStats, KeyAccess, MetricsSnapshot};
use crate::cache::{LruTracker, TOP_KEYS_LIMIT};
use crate::config::{CacheConfig, CacheConfigUpdate};
use crate::error::Result;

// == Cache Store ==
/// Entry store with LRU eviction, TTL support and byte/key budgets.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// LRU access tracker
    lru: LruTracker,
    /// Performance statistics
    stats: CacheStats,
    /// Budgets and codec settings
    config: CacheConfig,
    /// Sum of `size()` over every stored entry
    total_size: u64,
    /// Event fan-out
    events: EventPublisher,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            config,
            total_size: 0,
            events: EventPublisher::new(),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Configure ==
    /// Merges a partial configuration. Budgets are enforced from the next `set`.
    pub fn configure(&mut self, update: CacheConfigUpdate) -> CacheConfig {
        self.config.apply(update);
        if self.config.persist_to_disk {
            warn!("persist_to_disk is set but the cache is memory-only; ignoring");
        }
        info!(
            "Cache configuration updated: max_size={}, max_keys={}, default_ttl={}ms, compression={} (threshold {})",
            format_size(self.config.max_size),
            self.config.max_keys,
            self.config.default_ttl_ms,
            self.config.enable_compression,
            format_size(self.config.compression_threshold)
        );
        self.config.clone()
    }

    /// Handle for publishing; clones share subscribers.
    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    // == Get ==
    /// Retrieves and decodes a value by key.
    ///
    /// Absent, expired and undecodable entries all count as misses; expired
    /// and undecodable entries also count as evictions. A corrupt entry is
    /// dropped rather than reported, so callers simply fall through to
    /// recomputation.
    pub fn get<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let started = Instant::now();
        let now = current_timestamp_ms();

        let Some(entry) = self.entries.get_mut(key) else {
            self.stats.record_miss();
            return None;
        };

        if entry.is_expired_at(now) {
            self.expire(key);
            self.stats.record_miss();
            return None;
        }

        match codec::decode::<T>(&entry.payload, entry.compressed) {
            Ok(value) => {
                entry.touch(now);
                let size = entry.size();
                self.lru.touch(key);
                self.stats.record_hit();
                self.stats.record_access_time(started.elapsed());
                self.events.publish(CacheEvent::Hit {
                    key: key.to_string(),
                    size,
                });
                Some(value)
            }
            Err(err) => {
                warn!("Dropping unreadable cache entry {}: {}", key, err);
                if let Some(entry) = self.remove_entry(key) {
                    self.stats.record_eviction();
                    self.events.publish(CacheEvent::Evict {
                        key: key.to_string(),
                        size: entry.size(),
                        reason: EvictionReason::Corrupt,
                    });
                }
                self.stats.record_miss();
                None
            }
        }
    }

    // == Set ==
    /// Stores a value, replacing any existing entry at `key`.
    ///
    /// Encoding happens first, so a value that fails to serialize leaves the
    /// store untouched. Admission then evicts least recently used entries
    /// until the new entry fits; it never rejects a write.
    ///
    /// # Arguments
    /// * `ttl_ms` - TTL in milliseconds (uses `default_ttl_ms` if None)
    /// * `tags` - labels for `invalidate_by_tags`
    pub fn set<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
        ttl_ms: Option<u64>,
        tags: &[&str],
    ) -> Result<()> {
        let payload = codec::encode(value, &self.config)?;
        self.insert(key, payload, ttl_ms, tags);
        Ok(())
    }

    fn insert(&mut self, key: &str, payload: Payload, ttl_ms: Option<u64>, tags: &[&str]) {
        let size = codec::calculate_size(&payload.bytes);
        let compressed = payload.compressed;
        let compression_ratio = payload.compression_ratio();

        // The replaced entry must not count against the new one's budget
        self.remove_entry(key);
        self.ensure_space(size);

        let ttl = ttl_ms.unwrap_or(self.config.default_ttl_ms);
        let tags: BTreeSet<String> = tags.iter().map(|t| t.to_string()).collect();
        let entry = CacheEntry::new(key.to_string(), payload, ttl, tags);

        self.entries.insert(key.to_string(), entry);
        self.lru.touch(key);
        self.total_size += size;

        debug!(
            "Stored {} ({}{})",
            key,
            format_size(size),
            if compressed { ", compressed" } else { "" }
        );
        self.events.publish(CacheEvent::Set {
            key: key.to_string(),
            size,
            compressed,
            compression_ratio,
        });
    }

    // == Ensure Space ==
    /// Evicts LRU entries until one more key of `incoming` bytes fits.
    fn ensure_space(&mut self, incoming: u64) {
        while self.entries.len() >= self.config.max_keys {
            if !self.evict_lru() {
                break;
            }
        }
        while self.total_size + incoming > self.config.max_size {
            if !self.evict_lru() {
                break;
            }
        }
    }

    /// Evicts the least recently used entry. Returns false if the store is empty.
    fn evict_lru(&mut self) -> bool {
        let Some(key) = self.lru.evict_oldest() else {
            return false;
        };
        if let Some(entry) = self.entries.remove(&key) {
            let size = entry.size();
            self.total_size -= size;
            self.stats.record_eviction();
            debug!("Evicted {} ({}) under memory pressure", key, format_size(size));
            self.events.publish(CacheEvent::Evict {
                key,
                size,
                reason: EvictionReason::Lru,
            });
        }
        true
    }

    // == Has ==
    /// Checks for a live entry without touching access stats or hit/miss counters.
    ///
    /// An expired entry found here is removed like in `get`.
    pub fn has(&mut self, key: &str) -> bool {
        let expired = match self.entries.get(key) {
            None => return false,
            Some(entry) => entry.is_expired(),
        };
        if expired {
            self.expire(key);
        }
        !expired
    }

    // == Delete ==
    /// Removes an entry by key, returning whether it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        match self.remove_entry(key) {
            Some(entry) => {
                let size = entry.size();
                debug!("Deleted {}", key);
                self.events.publish(CacheEvent::Delete {
                    key: key.to_string(),
                    size,
                });
                true
            }
            None => false,
        }
    }

    // == Clear ==
    /// Drops every entry. Cumulative hit/miss/eviction counters are kept.
    pub fn clear(&mut self) {
        let total_keys = self.entries.len();
        let total_size = self.total_size;

        self.entries.clear();
        self.lru.clear();
        self.total_size = 0;

        info!(
            "Cache cleared: {} entries, {}",
            total_keys,
            format_size(total_size)
        );
        self.events.publish(CacheEvent::Clear {
            total_keys,
            total_size,
        });
    }

    /// Zeroes hit/miss/eviction counters and the latency window.
    pub fn reset_metrics(&mut self) {
        self.stats.reset();
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = current_timestamp_ms();
        let expired_keys: Vec<String> = self
            .entries
            .values()
            .filter(|entry| entry.is_expired_at(now))
            .map(|entry| entry.key.clone())
            .collect();

        let size_before = self.total_size;
        for key in &expired_keys {
            self.expire(key);
        }

        if !expired_keys.is_empty() {
            info!(
                "Expired {} entries, freed {}",
                expired_keys.len(),
                format_size(size_before - self.total_size)
            );
        }
        expired_keys.len()
    }

    // == Invalidate By Tags ==
    /// Deletes every entry carrying at least one of `tags`.
    pub fn invalidate_by_tags(&mut self, tags: &[&str]) -> usize {
        let keys: Vec<String> = self
            .entries
            .values()
            .filter(|entry| entry.has_any_tag(tags))
            .map(|entry| entry.key.clone())
            .collect();

        let invalidated = keys.iter().filter(|key| self.delete(key)).count();
        if invalidated > 0 {
            info!(
                "Invalidated {} entries by tags: {}",
                invalidated,
                tags.join(", ")
            );
        }
        invalidated
    }

    // == Invalidate By Pattern ==
    /// Deletes every entry whose key matches `pattern`.
    pub fn invalidate_by_pattern(&mut self, pattern: &Regex) -> usize {
        let keys: Vec<String> = self
            .entries
            .keys()
            .filter(|key| pattern.is_match(key))
            .cloned()
            .collect();

        let invalidated = keys.iter().filter(|key| self.delete(key)).count();
        if invalidated > 0 {
            info!(
                "Invalidated {} entries by pattern: {}",
                invalidated,
                pattern.as_str()
            );
        }
        invalidated
    }

    // == Key Info ==
    /// Metadata for a live key.
    pub fn get_key_info(&self, key: &str) -> Option<EntryInfo> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(CacheEntry::info)
    }

    // == List Keys ==
    /// Live keys, optionally filtered, most accessed first.
    pub fn list_keys(&self, pattern: Option<&Regex>, limit: usize) -> Vec<KeyListing> {
        let now = current_timestamp_ms();
        let mut keys: Vec<KeyListing> = self
            .entries
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .filter(|entry| pattern.map_or(true, |p| p.is_match(&entry.key)))
            .map(|entry| KeyListing {
                key: entry.key.clone(),
                size: entry.size(),
                ttl_ms: entry.ttl_ms,
                age_ms: now.saturating_sub(entry.created_at),
                access_count: entry.access_count,
            })
            .collect();

        keys.sort_by(|a, b| {
            b.access_count
                .cmp(&a.access_count)
                .then_with(|| a.key.cmp(&b.key))
        });
        keys.truncate(limit);
        keys
    }

    // == Metrics ==
    /// Snapshot of counters, top keys and per-namespace sizes.
    ///
    /// `top_keys` and `size_by_namespace` cover live entries only, while
    /// `total_keys` and `total_size` still count expired entries that no
    /// read or sweep has removed yet.
    pub fn metrics(&self) -> MetricsSnapshot {
        let now = current_timestamp_ms();
        let live: Vec<&CacheEntry> = self
            .entries
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .collect();

        let mut top_keys: Vec<KeyAccess> = live
            .iter()
            .map(|entry| KeyAccess {
                key: entry.key.clone(),
                access_count: entry.access_count,
                size: entry.size(),
            })
            .collect();
        top_keys.sort_by(|a, b| {
            b.access_count
                .cmp(&a.access_count)
                .then_with(|| a.key.cmp(&b.key))
        });
        top_keys.truncate(TOP_KEYS_LIMIT);

        let mut size_by_namespace = BTreeMap::new();
        for entry in &live {
            *size_by_namespace
                .entry(entry.namespace().to_string())
                .or_insert(0) += entry.size();
        }

        MetricsSnapshot {
            hits: self.stats.hits,
            misses: self.stats.misses,
            hit_rate: self.stats.hit_rate(),
            evictions: self.stats.evictions,
            total_keys: self.entries.len(),
            total_size: self.total_size,
            average_access_time_ms: self.stats.average_access_time_ms(),
            top_keys,
            size_by_namespace,
        }
    }

    /// Current hit/miss/eviction counters.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Sum of stored entry sizes in bytes.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes an entry and its accounting without recording anything.
    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(key);
        self.total_size -= entry.size();
        Some(entry)
    }

    /// Removes an entry whose TTL elapsed and records it as an eviction.
    fn expire(&mut self, key: &str) {
        if let Some(entry) = self.remove_entry(key) {
            self.stats.record_eviction();
            self.events.publish(CacheEvent::Evict {
                key: key.to_string(),
                size: entry.size(),
                reason: EvictionReason::Expired,
            });
        }
    }

    /// Recomputes the size aggregate from scratch.
    #[cfg(test)]
    pub(crate) fn computed_size(&self) -> u64 {
        self.entries.values().map(CacheEntry::size).sum()
    }
}
