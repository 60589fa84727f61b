//! Configuration Module
//!
//! Handles loading cache and server configuration from environment variables,
//! and merging partial updates into a live cache configuration.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default byte budget (100 MB)
pub const DEFAULT_MAX_SIZE: u64 = 100 * 1024 * 1024;
/// Default key-count budget
pub const DEFAULT_MAX_KEYS: usize = 10_000;
/// Default TTL in milliseconds (15 minutes)
pub const DEFAULT_TTL_MS: u64 = 15 * 60 * 1000;
/// Default size above which payloads are compressed (1 KB)
pub const DEFAULT_COMPRESSION_THRESHOLD: u64 = 1024;
/// Default interval between expiration sweeps (5 minutes)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
/// Shortest accepted sweep interval; zero is raised to this
pub const MIN_SWEEP_INTERVAL_SECS: u64 = 1;

// == Cache Config ==
/// Runtime-tunable cache parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Byte budget over the stored (possibly compressed) representations
    pub max_size: u64,
    /// Maximum number of live keys
    pub max_keys: usize,
    /// TTL in milliseconds for entries set without an explicit TTL
    pub default_ttl_ms: u64,
    /// Whether payloads above `compression_threshold` are compressed
    pub enable_compression: bool,
    /// Serialized size in bytes above which compression is attempted
    pub compression_threshold: u64,
    /// Interval in seconds between background expiration sweeps
    pub sweep_interval_secs: u64,
    /// Accepted for compatibility; the cache never writes to disk
    pub persist_to_disk: bool,
    /// Accepted for compatibility; unused
    pub persistence_file: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            max_keys: DEFAULT_MAX_KEYS,
            default_ttl_ms: DEFAULT_TTL_MS,
            enable_compression: true,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            persist_to_disk: false,
            persistence_file: None,
        }
    }
}

impl CacheConfig {
    // == Apply ==
    /// Merges a partial update, overriding only the fields it sets.
    pub fn apply(&mut self, update: CacheConfigUpdate) {
        if let Some(v) = update.max_size {
            self.max_size = v;
        }
        if let Some(v) = update.max_keys {
            self.max_keys = v;
        }
        if let Some(v) = update.default_ttl_ms {
            self.default_ttl_ms = v;
        }
        if let Some(v) = update.enable_compression {
            self.enable_compression = v;
        }
        if let Some(v) = update.compression_threshold {
            self.compression_threshold = v;
        }
        if let Some(v) = update.sweep_interval_secs {
            self.sweep_interval_secs = v.max(MIN_SWEEP_INTERVAL_SECS);
        }
        if let Some(v) = update.persist_to_disk {
            self.persist_to_disk = v;
        }
        if update.persistence_file.is_some() {
            self.persistence_file = update.persistence_file;
        }
    }
}

// == Cache Config Update ==
/// Partial configuration accepted by `configure`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfigUpdate {
    pub max_size: Option<u64>,
    pub max_keys: Option<usize>,
    pub default_ttl_ms: Option<u64>,
    pub enable_compression: Option<bool>,
    pub compression_threshold: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
    pub persist_to_disk: Option<bool>,
    pub persistence_file: Option<String>,
}

/// Process configuration for the diagnostic server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Initial cache configuration
    pub cache: CacheConfig,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE` - Byte budget (default: 100 MB)
    /// - `CACHE_MAX_KEYS` - Key budget (default: 10000)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 900000)
    /// - `CACHE_ENABLE_COMPRESSION` - `true`/`false` (default: true)
    /// - `CACHE_COMPRESSION_THRESHOLD` - Bytes (default: 1024)
    /// - `CACHE_SWEEP_INTERVAL` - Sweep frequency in seconds (default: 300)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = CacheConfig::default();
        Self {
            cache: CacheConfig {
                max_size: env_or("CACHE_MAX_SIZE", defaults.max_size),
                max_keys: env_or("CACHE_MAX_KEYS", defaults.max_keys),
                default_ttl_ms: env_or("CACHE_DEFAULT_TTL_MS", defaults.default_ttl_ms),
                enable_compression: env_or(
                    "CACHE_ENABLE_COMPRESSION",
                    defaults.enable_compression,
                ),
                compression_threshold: env_or(
                    "CACHE_COMPRESSION_THRESHOLD",
                    defaults.compression_threshold,
                ),
                sweep_interval_secs: env_or("CACHE_SWEEP_INTERVAL", defaults.sweep_interval_secs)
                    .max(MIN_SWEEP_INTERVAL_SECS),
                ..defaults
            },
            server_port: env_or("SERVER_PORT", 3000),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            server_port: 3000,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
