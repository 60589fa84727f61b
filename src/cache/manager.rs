//! Query Cache Module
//!
//! Thread-safe handle over a `CacheStore`: get-or-compute with at most one
//! in-flight computation per key, bulk invalidation, warmup, memoization and
//! the expiration sweeper lifecycle.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, BoxFuture, FutureExt};
use parking_lot::Mutex;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::{broadcast, Mutex as AsyncMutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::{
    CacheEvent, CacheStore, EntryInfo, EventPublisher, KeyListing, MetricsSnapshot, QUERY_TAGS,
    WARMUP_TAG,
};
use crate::config::{CacheConfig, CacheConfigUpdate};
use crate::error::{CacheError, Result};
use crate::tasks::spawn_sweeper_task;

type KeyLocks = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

// == Query Cache ==
/// Shared cache handle. Clones refer to the same cache.
///
/// Every operation on the store goes through one `RwLock`, so the size and
/// key aggregates always move together with the entry they describe.
#[derive(Clone)]
pub struct QueryCache {
    store: Arc<RwLock<CacheStore>>,
    events: EventPublisher,
    in_flight: Arc<KeyLocks>,
    sweeper: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl QueryCache {
    // == Constructor ==
    /// Creates a cache. The sweeper is not running until `start_sweeper`.
    pub fn new(config: CacheConfig) -> Self {
        let store = CacheStore::new(config);
        let events = store.events().clone();
        Self {
            store: Arc::new(RwLock::new(store)),
            events,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            sweeper: Arc::new(Mutex::new(None)),
        }
    }

    /// Underlying store, for callers that need several operations under one lock.
    pub fn store(&self) -> Arc<RwLock<CacheStore>> {
        self.store.clone()
    }

    /// Registers an event subscriber.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Applies a partial configuration.
    ///
    /// A new `sweep_interval_secs` restarts a running sweeper on that interval.
    pub async fn configure(&self, update: CacheConfigUpdate) -> CacheConfig {
        let interval_changed = update.sweep_interval_secs.is_some();
        let config = self.store.write().await.configure(update);

        if interval_changed && self.stop_sweeper() {
            self.start_sweeper(Duration::from_secs(config.sweep_interval_secs));
            info!(
                "Expiration sweeper restarted with interval of {}s",
                config.sweep_interval_secs
            );
        }
        config
    }

    pub async fn config(&self) -> CacheConfig {
        self.store.read().await.config().clone()
    }

    // == Point Operations ==
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.store.write().await.get(key)
    }

    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_ms: Option<u64>,
        tags: &[&str],
    ) -> Result<()> {
        self.store.write().await.set(key, value, ttl_ms, tags)
    }

    pub async fn has(&self, key: &str) -> bool {
        self.store.write().await.has(key)
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.store.write().await.delete(key)
    }

    pub async fn clear(&self) {
        self.store.write().await.clear();
    }

    pub async fn reset_metrics(&self) {
        self.store.write().await.reset_metrics();
    }

    // == Get Or Set ==
    /// Returns the cached value for `key`, computing and storing it on a miss.
    ///
    /// Concurrent callers missing on the same key queue behind a per-key lock;
    /// only the first runs `factory`, the rest read what it stored. A failing
    /// factory stores nothing and its error goes to that caller alone.
    pub async fn get_or_set<T, F, Fut, E>(
        &self,
        key: &str,
        factory: F,
        ttl_ms: Option<u64>,
        tags: &[&str],
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<CacheError>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let slot = InFlight::acquire(&self.in_flight, key);
        let _computing = slot.lock.lock().await;

        // Someone else may have filled the key while we waited
        if self.has(key).await {
            if let Some(value) = self.get(key).await {
                return Ok(value);
            }
        }

        let value = factory().await?;
        self.set(key, &value, ttl_ms, tags).await?;
        Ok(value)
    }

    // == Invalidation ==
    pub async fn invalidate_by_tags(&self, tags: &[&str]) -> usize {
        self.store.write().await.invalidate_by_tags(tags)
    }

    pub async fn invalidate_by_pattern(&self, pattern: &Regex) -> usize {
        self.store.write().await.invalidate_by_pattern(pattern)
    }

    // == Introspection ==
    pub async fn get_metrics(&self) -> MetricsSnapshot {
        self.store.read().await.metrics()
    }

    pub async fn get_key_info(&self, key: &str) -> Option<EntryInfo> {
        self.store.read().await.get_key_info(key)
    }

    pub async fn list_keys(&self, pattern: Option<&Regex>, limit: usize) -> Vec<KeyListing> {
        self.store.read().await.list_keys(pattern, limit)
    }

    // == Warmup ==
    /// Populates missing keys ahead of demand.
    ///
    /// Factories run concurrently. A failing factory is logged and counted;
    /// it never stops the others.
    pub async fn warmup(&self, entries: Vec<WarmupEntry>) -> WarmupReport {
        info!("Warming up cache with {} entries", entries.len());

        let outcomes = join_all(entries.into_iter().map(|entry| self.warm_one(entry))).await;

        let mut report = WarmupReport::default();
        for outcome in outcomes {
            match outcome {
                WarmupOutcome::Loaded => report.loaded += 1,
                WarmupOutcome::Skipped => report.skipped += 1,
                WarmupOutcome::Failed => report.failed += 1,
            }
        }

        info!(
            "Warmup complete: {} loaded, {} skipped, {} failed",
            report.loaded, report.skipped, report.failed
        );
        report
    }

    async fn warm_one(&self, entry: WarmupEntry) -> WarmupOutcome {
        if self.has(&entry.key).await {
            return WarmupOutcome::Skipped;
        }

        let value = match entry.factory.await {
            Ok(value) => value,
            Err(err) => {
                warn!("Warmup factory for {} failed: {:#}", entry.key, err);
                return WarmupOutcome::Failed;
            }
        };

        match self.set(&entry.key, &value, entry.ttl_ms, &[WARMUP_TAG]).await {
            Ok(()) => WarmupOutcome::Loaded,
            Err(err) => {
                warn!("Warmup value for {} could not be stored: {}", entry.key, err);
                WarmupOutcome::Failed
            }
        }
    }

    // == Query Caching ==
    /// Caches the result of a parameterized read under a key derived from
    /// the normalized query text and its parameters.
    pub async fn cached_query<T, P, F, Fut, E>(
        &self,
        query_text: &str,
        params: &P,
        ttl_ms: Option<u64>,
        factory: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        P: Serialize + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<CacheError>,
    {
        let key = generate_query_key(query_text, params)?;
        self.get_or_set(&key, factory, ttl_ms, &QUERY_TAGS).await
    }

    // == Memoize ==
    /// Caches a function call keyed by `scope`, `function` and its arguments.
    ///
    /// ```ignore
    /// let invoices = cache
    ///     .memoize("InvoiceService", "list_for_customer", &(customer_id,), None, &["invoices"],
    ///         || repo.list_for_customer(customer_id))
    ///     .await?;
    /// ```
    #[allow(clippy::too_many_arguments)]
    pub async fn memoize<A, T, F, Fut, E>(
        &self,
        scope: &str,
        function: &str,
        args: &A,
        ttl_ms: Option<u64>,
        tags: &[&str],
        f: F,
    ) -> std::result::Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<CacheError>,
    {
        let key = memo_key(scope, function, args)?;
        self.get_or_set(&key, f, ttl_ms, tags).await
    }

    // == Sweeper Lifecycle ==
    /// Starts the expiration sweeper. Returns false if it is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_sweeper(&self, interval: Duration) -> bool {
        let mut slot = self.sweeper.lock();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }
        *slot = Some(spawn_sweeper_task(self.store.clone(), interval));
        true
    }

    /// Stops the sweeper. Returns false if it was not running.
    pub fn stop_sweeper(&self) -> bool {
        match self.sweeper.lock().take() {
            Some(handle) => {
                handle.abort();
                info!("Expiration sweeper stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // == Close ==
    /// Stops the sweeper and drops every entry. Call once at shutdown.
    pub async fn close(&self) {
        self.stop_sweeper();
        self.clear().await;
        info!("Cache closed");
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

// == In-Flight Guard ==
/// A caller's claim on a key's computation lock.
///
/// The map entry is removed by whichever claimant drops last.
struct InFlight<'a> {
    locks: &'a KeyLocks,
    key: &'a str,
    lock: Arc<AsyncMutex<()>>,
}

impl<'a> InFlight<'a> {
    fn acquire(locks: &'a KeyLocks, key: &'a str) -> Self {
        let lock = locks
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        Self { locks, key, lock }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        let ours = locks
            .get(self.key)
            .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock));
        // Map + this claim are the only holders left
        if ours && Arc::strong_count(&self.lock) == 2 {
            locks.remove(self.key);
        }
    }
}

// == Warmup Types ==
/// One key to populate during warmup.
pub struct WarmupEntry {
    pub key: String,
    pub ttl_ms: Option<u64>,
    factory: BoxFuture<'static, anyhow::Result<serde_json::Value>>,
}

impl WarmupEntry {
    /// The factory is not polled if `key` is already cached.
    pub fn new<F>(key: impl Into<String>, ttl_ms: Option<u64>, factory: F) -> Self
    where
        F: Future<Output = anyhow::Result<serde_json::Value>> + Send + 'static,
    {
        Self {
            key: key.into(),
            ttl_ms,
            factory: factory.boxed(),
        }
    }
}

/// Per-entry counts from a warmup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmupReport {
    pub loaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum WarmupOutcome {
    Loaded,
    Skipped,
    Failed,
}

// == Key Derivation ==
/// Deterministic key for a parameterized query.
///
/// Runs of whitespace in `query_text` collapse to one space, so formatting
/// differences do not split the cache.
pub fn generate_query_key<P: Serialize + ?Sized>(query_text: &str, params: &P) -> Result<String> {
    let normalized = query_text.split_whitespace().collect::<Vec<_>>().join(" ");
    let params = serde_json::to_string(params)?;

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hasher.update(b"\n");
    hasher.update(params.as_bytes());
    Ok(format!("query:{:x}", hasher.finalize()))
}

/// Key for a memoized call: `scope:function:<json args>`.
pub fn memo_key<A: Serialize + ?Sized>(scope: &str, function: &str, args: &A) -> Result<String> {
    Ok(format!(
        "{}:{}:{}",
        scope,
        function,
        serde_json::to_string(args)?
    ))
}
