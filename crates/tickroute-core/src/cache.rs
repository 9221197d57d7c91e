//! Self-refreshing cache: LRU + TTL with pre-emptive background refresh.
//!
//! Read latency is decoupled from upstream latency: once an entry crosses
//! its refresh threshold (or, with soft expiry, its hard TTL) the caller
//! still gets an immediate answer while a bounded background worker fetches
//! a replacement. Refresh failures never reach `get` callers.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};

use crate::error::FetchError;

/// Closure that re-fetches a cached value in the background.
pub type RefreshFn<V> =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<V, FetchError>> + Send>> + Send + Sync>;

/// Cache sizing and freshness policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheConfig {
    /// LRU capacity; the least-recently-used entry is evicted past this.
    pub max_size: usize,
    pub default_ttl: Duration,
    /// Fraction of TTL after which a hit schedules a pre-emptive refresh.
    pub refresh_threshold: f64,
    /// Serve hard-expired entries (that can refresh) instead of missing.
    pub soft_expiry: bool,
    /// Concurrent background refresh limit across all keys.
    pub refresh_workers: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 128,
            default_ttl: Duration::from_secs(300),
            refresh_threshold: 0.8,
            soft_expiry: true,
            refresh_workers: 5,
        }
    }
}

/// Hit/miss and refresh counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub refreshes: u64,
    pub refresh_failures: u64,
}

struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
    expires_at: Instant,
    refresh_at: Instant,
    refresh: Option<RefreshFn<V>>,
    last_used: u64,
}

struct CacheInner<V> {
    map: HashMap<String, CacheEntry<V>>,
    in_flight: HashSet<String>,
    tick: u64,
    stats: CacheStats,
}

impl<V> CacheInner<V> {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            in_flight: HashSet::new(),
            tick: 0,
            stats: CacheStats::default(),
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// Thread-safe per-endpoint result cache.
pub struct SmartCache<V> {
    config: CacheConfig,
    inner: Arc<Mutex<CacheInner<V>>>,
    refresh_slots: Arc<Semaphore>,
}

impl<V> Clone for SmartCache<V> {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            inner: Arc::clone(&self.inner),
            refresh_slots: Arc::clone(&self.refresh_slots),
        }
    }
}

impl<V> SmartCache<V>
where
    V: Clone + Send + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner::new())),
            refresh_slots: Arc::new(Semaphore::new(config.refresh_workers.max(1))),
            config,
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Look up `key`, scheduling a background refresh when the entry has
    /// crossed its refresh threshold or (with soft expiry) its hard TTL.
    ///
    /// A hard-expired entry without a refresh function is removed and
    /// reported as a miss.
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock().await;
        let tick = inner.next_tick();
        let now = Instant::now();

        let Some(entry) = inner.map.get_mut(key) else {
            inner.stats.misses += 1;
            return None;
        };
        entry.last_used = tick;
        let value = entry.value.clone();
        let refresh = entry.refresh.clone();
        let hard_expired = now > entry.expires_at;
        let due_refresh = now > entry.refresh_at;

        if hard_expired {
            if self.config.soft_expiry {
                if let Some(refresh) = refresh {
                    self.schedule_refresh(&mut inner, key, refresh);
                    inner.stats.hits += 1;
                    return Some(value);
                }
            }
            inner.map.remove(key);
            inner.stats.misses += 1;
            return None;
        }

        if due_refresh {
            if let Some(refresh) = refresh {
                self.schedule_refresh(&mut inner, key, refresh);
            }
        }

        inner.stats.hits += 1;
        Some(value)
    }

    /// Insert or replace an entry.
    ///
    /// An existing refresh function survives a `set` that supplies none, so
    /// background refresh keeps working when the refresh itself writes the
    /// new value back.
    pub async fn set(
        &self,
        key: &str,
        value: V,
        ttl: Option<Duration>,
        refresh: Option<RefreshFn<V>>,
    ) {
        let mut inner = self.inner.lock().await;
        self.insert_locked(&mut inner, key, value, ttl, refresh);
    }

    pub async fn invalidate(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().await;
        inner.map.remove(key).is_some()
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.map.clear();
    }

    /// Remove hard-expired entries, independent of LRU order.
    pub async fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let before = inner.map.len();
        inner.map.retain(|_, entry| entry.expires_at >= now);
        before - inner.map.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.map.is_empty()
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.lock().await.stats
    }

    fn insert_locked(
        &self,
        inner: &mut CacheInner<V>,
        key: &str,
        value: V,
        ttl: Option<Duration>,
        refresh: Option<RefreshFn<V>>,
    ) {
        let tick = inner.next_tick();
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let now = Instant::now();
        let threshold = self.config.refresh_threshold.clamp(0.0, 1.0);
        let refresh = refresh.or_else(|| inner.map.get(key).and_then(|e| e.refresh.clone()));

        inner.map.insert(
            key.to_owned(),
            CacheEntry {
                value,
                created_at: now,
                ttl,
                expires_at: now + ttl,
                refresh_at: now + ttl.mul_f64(threshold),
                refresh,
                last_used: tick,
            },
        );

        while inner.map.len() > self.config.max_size.max(1) {
            let Some(lru_key) = inner
                .map
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            inner.map.remove(&lru_key);
            inner.stats.evictions += 1;
        }
    }

    /// Dispatch a background refresh unless one is already in flight for
    /// this key. The in-flight marker is cleared on every exit path.
    fn schedule_refresh(&self, inner: &mut CacheInner<V>, key: &str, refresh: RefreshFn<V>) {
        if !inner.in_flight.insert(key.to_owned()) {
            return;
        }
        inner.stats.refreshes += 1;

        let cache = self.clone();
        let key = key.to_owned();
        tokio::spawn(async move {
            let outcome = match Arc::clone(&cache.refresh_slots).acquire_owned().await {
                Ok(_permit) => refresh().await,
                Err(_) => Err(FetchError::internal("refresh worker pool closed")),
            };
            cache.finish_refresh(&key, outcome).await;
        });
    }

    async fn finish_refresh(&self, key: &str, outcome: Result<V, FetchError>) {
        let mut inner = self.inner.lock().await;
        inner.in_flight.remove(key);

        match outcome {
            Ok(value) => {
                // Entry may have been invalidated while the refresh ran;
                // only replace what is still cached. Same TTL, refresh
                // function preserved by insert_locked.
                let Some((ttl, age)) = inner
                    .map
                    .get(key)
                    .map(|entry| (entry.ttl, entry.created_at.elapsed()))
                else {
                    debug!(key, "discarding refresh result for removed entry");
                    return;
                };
                self.insert_locked(&mut inner, key, value, Some(ttl), None);
                debug!(key, age_ms = age.as_millis() as u64, "cache entry refreshed");
            }
            Err(error) => {
                inner.stats.refresh_failures += 1;
                warn!(key, error = %error, "background cache refresh failed");
            }
        }
    }
}
