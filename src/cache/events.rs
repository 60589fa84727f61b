//! Cache Events Module
//!
//! Structured notifications published on every mutation and hit. Events are
//! informational only; the store never reads them back.

use serde::Serialize;
use tokio::sync::broadcast;

/// Buffered events per subscriber before lagging receivers drop the oldest.
const CACHE_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Why an entry was evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EvictionReason {
    /// Removed to make room under the size or key budget
    Lru,
    /// Removed because its TTL elapsed
    Expired,
    /// Removed on read because its payload could not be decoded
    Corrupt,
}

/// Notification emitted by the cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CacheEvent {
    Hit {
        key: String,
        size: u64,
    },
    Set {
        key: String,
        size: u64,
        compressed: bool,
        compression_ratio: f64,
    },
    Delete {
        key: String,
        size: u64,
    },
    Evict {
        key: String,
        size: u64,
        reason: EvictionReason,
    },
    Clear {
        total_keys: usize,
        total_size: u64,
    },
}

// == Event Publisher ==
/// Fan-out of cache events to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<CacheEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        let (sender, _rx) = broadcast::channel(CACHE_EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Registers a new subscriber that sees events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event; a cache without subscribers simply drops it.
    pub fn publish(&self, event: CacheEvent) {
        if self.sender.receiver_count() > 0 {
            let _ = self.sender.send(event);
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
