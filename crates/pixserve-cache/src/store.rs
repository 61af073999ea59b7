//! TTL cache store
//!
//! Mapping from cache key to cached artifact with per-entry expiry. Expiry is
//! both lazy (lookups treat expired entries as misses) and active (a spawned
//! sweeper task removes expired entries on a fixed interval). Mutations are
//! atomic per key; readers see a whole entry or none.
//!
//! The store is an explicitly constructed component: build it at service
//! startup, share it behind an `Arc`, and shut the sweeper down on teardown.
//! Fresh instances per test keep tests isolated.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::interval;

use pixserve_core::CacheEntry;

struct StoredEntry {
    entry: CacheEntry,
    expires_at: Instant,
}

/// Snapshot of cache accounting. Hit/miss counters are monotonic for the
/// store's lifetime; `clear` does not reset them.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

pub struct CacheStore {
    default_ttl: Duration,
    entries: RwLock<HashMap<String, StoredEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a live entry. Expired entries count as misses even if the
    /// sweeper has not removed them yet.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = Instant::now();
        let hit = {
            let entries = self.entries.read().expect("cache lock poisoned");
            entries
                .get(key)
                .filter(|stored| stored.expires_at > now)
                .map(|stored| stored.entry.clone())
        };
        match hit {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert with the store's default TTL.
    pub fn insert(&self, key: impl Into<String>, entry: CacheEntry) {
        self.insert_with_ttl(key, entry, self.default_ttl);
    }

    /// Insert with an explicit per-entry TTL. Replaces any existing entry
    /// under the key atomically.
    pub fn insert_with_ttl(&self, key: impl Into<String>, entry: CacheEntry, ttl: Duration) {
        let stored = StoredEntry {
            entry,
            expires_at: Instant::now() + ttl,
        };
        let mut entries = self.entries.write().expect("cache lock poisoned");
        entries.insert(key.into(), stored);
    }

    pub fn remove(&self, key: &str) -> bool {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        entries.remove(key).is_some()
    }

    /// Remove every entry whose key matches the predicate; returns the
    /// number removed. Folder-scoped eviction passes a key-prefix predicate.
    pub fn remove_where(&self, predicate: impl Fn(&str) -> bool) -> usize {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|key, _| !predicate(key));
        before - entries.len()
    }

    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            entry_count: self.len(),
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }

    /// Remove entries past their expiry; returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, stored| stored.expires_at > now);
        before - entries.len()
    }

    /// Spawn the background sweeper. The returned handle stops the task on
    /// [`SweeperHandle::shutdown`] or when dropped along with the runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, sweep_interval: Duration) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let store = Arc::clone(self);

        tokio::spawn(async move {
            let mut tick = interval(sweep_interval);
            // The first tick fires immediately; skip it so a fresh store is
            // not swept before anything is inserted.
            tick.tick().await;

            tracing::info!(
                sweep_interval_secs = sweep_interval.as_secs(),
                "Cache sweeper started"
            );

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let removed = store.sweep_expired();
                        if removed > 0 {
                            tracing::debug!(
                                removed = removed,
                                remaining = store.len(),
                                "Swept expired cache entries"
                            );
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Cache sweeper shutting down");
                        break;
                    }
                }
            }
        });

        SweeperHandle { shutdown_tx }
    }
}

/// Handle to the background sweeper task.
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SweeperHandle {
    pub async fn shutdown(&self) {
        if self.shutdown_tx.send(()).await.is_err() {
            tracing::warn!("Cache sweeper already stopped");
        }
    }
}
