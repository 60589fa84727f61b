//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, evictions and
//! recent access latency.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use serde::Serialize;

/// Number of recent access latencies kept for the average.
pub const LATENCY_WINDOW: usize = 1000;

// == Cache Stats ==
/// Cumulative counters plus a bounded window of recent hit latencies.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found, expired or corrupt)
    pub misses: u64,
    /// Entries removed by LRU pressure or expiry
    pub evictions: u64,
    /// Most recent access latencies, oldest first
    latencies: VecDeque<Duration>,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Record Access Time ==
    /// Adds a latency sample, dropping the oldest once the window is full.
    pub fn record_access_time(&mut self, elapsed: Duration) {
        if self.latencies.len() == LATENCY_WINDOW {
            self.latencies.pop_front();
        }
        self.latencies.push_back(elapsed);
    }

    // == Average Access Time ==
    /// Mean of the recorded window in milliseconds, 0.0 when empty.
    pub fn average_access_time_ms(&self) -> f64 {
        if self.latencies.is_empty() {
            return 0.0;
        }
        let total: Duration = self.latencies.iter().sum();
        total.as_secs_f64() * 1000.0 / self.latencies.len() as f64
    }

    pub fn sample_count(&self) -> usize {
        self.latencies.len()
    }

    /// Zeroes every counter and drops the latency window.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// == Key Access ==
/// A frequently accessed key, as reported in `MetricsSnapshot::top_keys`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyAccess {
    pub key: String,
    pub access_count: u64,
    pub size: u64,
}

// == Metrics Snapshot ==
/// Point-in-time view of the cache returned by `get_metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub evictions: u64,
    pub total_keys: usize,
    pub total_size: u64,
    pub average_access_time_ms: f64,
    /// Most accessed live keys, descending
    pub top_keys: Vec<KeyAccess>,
    /// Stored bytes per key namespace
    pub size_by_namespace: BTreeMap<String, u64>,
}

// == Format Size ==
/// Formats a byte count for log lines, e.g. `1.50 KB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.sample_count(), 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_average_access_time() {
        let mut stats = CacheStats::new();
        assert_eq!(stats.average_access_time_ms(), 0.0);

        stats.record_access_time(Duration::from_millis(2));
        stats.record_access_time(Duration::from_millis(4));
        assert!((stats.average_access_time_ms() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_latency_window_discards_oldest() {
        let mut stats = CacheStats::new();
        stats.record_access_time(Duration::from_secs(100));
        for _ in 0..LATENCY_WINDOW {
            stats.record_access_time(Duration::from_millis(1));
        }

        // The 100s outlier has been pushed out of the window
        assert_eq!(stats.sample_count(), LATENCY_WINDOW);
        assert!((stats.average_access_time_ms() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_eviction();
        stats.record_access_time(Duration::from_millis(1));

        stats.reset();

        assert_eq!(stats.hits, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.sample_count(), 0);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512.00 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(100 * 1024 * 1024), "100.00 MB");
    }
}
