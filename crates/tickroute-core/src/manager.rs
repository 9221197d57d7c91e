//! Composition root: one breaker and one cache per endpoint, wired to the
//! registry and router behind a single calling contract.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use tracing::warn;

use crate::cache::{CacheConfig, CacheStats, RefreshFn, SmartCache};
use crate::circuit_breaker::{
    BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitStats,
};
use crate::endpoint::{EndpointConfig, HealthPolicy};
use crate::error::InvokeError;
use crate::fetch::{EndpointFetcher, Params};
use crate::registry::EndpointRegistry;
use crate::router::{EndpointFilter, EndpointRouter};
use tickroute_store::ConfigStore;

/// Source-config key endpoints may use to override the default cache TTL.
/// The only `source_config` key this layer interprets.
const CACHE_TTL_KEY: &str = "cache_ttl_secs";

/// Tunables for the whole routing layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManagerConfig {
    pub cache: CacheConfig,
    pub breaker: CircuitBreakerConfig,
    pub health: HealthPolicy,
}

/// One row of the operator-facing endpoint table.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointSummary {
    pub endpoint_name: String,
    pub source_name: String,
    pub data_category: String,
    pub priority: u32,
    pub quality_score: u8,
    pub status: &'static str,
    pub health_status: &'static str,
    pub success_rate: f64,
    pub avg_response_time_ms: f64,
    pub consecutive_failures: u32,
    pub breaker_state: Option<&'static str>,
    pub last_success_time: Option<String>,
}

/// Builder for [`RouteManager`]; configuration sources and fetchers are
/// injected here, never resolved from ambient globals.
#[derive(Default)]
pub struct RouteManagerBuilder {
    config: ManagerConfig,
    store: Option<Arc<ConfigStore>>,
    yaml_path: Option<PathBuf>,
    fetchers: HashMap<String, Arc<dyn EndpointFetcher>>,
}

impl RouteManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_store(mut self, store: Arc<ConfigStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Open the config store at `path`. An unopenable store is logged and
    /// skipped; the registry then works from YAML alone.
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match ConfigStore::open(path.as_path()) {
            Ok(store) => self.store = Some(Arc::new(store)),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "config store unavailable");
            }
        }
        self
    }

    pub fn with_yaml(mut self, path: impl Into<PathBuf>) -> Self {
        self.yaml_path = Some(path.into());
        self
    }

    pub fn register_fetcher(
        mut self,
        endpoint_name: impl Into<String>,
        fetcher: Arc<dyn EndpointFetcher>,
    ) -> Self {
        self.fetchers.insert(endpoint_name.into(), fetcher);
        self
    }

    pub fn build(self) -> RouteManager {
        let registry = Arc::new(EndpointRegistry::new(self.config.health));
        let manager = RouteManager {
            router: EndpointRouter::new(Arc::clone(&registry)),
            registry,
            config: self.config,
            store: self.store,
            yaml_path: self.yaml_path,
            breakers: Mutex::new(HashMap::new()),
            caches: Mutex::new(HashMap::new()),
            fetchers: RwLock::new(self.fetchers),
        };
        manager.reload();
        manager
    }
}

/// Owns all per-endpoint breakers and caches and exposes the public
/// contract to calling business code.
pub struct RouteManager {
    registry: Arc<EndpointRegistry>,
    router: EndpointRouter,
    config: ManagerConfig,
    store: Option<Arc<ConfigStore>>,
    yaml_path: Option<PathBuf>,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
    caches: Mutex<HashMap<String, SmartCache<Value>>>,
    fetchers: RwLock<HashMap<String, Arc<dyn EndpointFetcher>>>,
}

impl RouteManager {
    pub fn builder() -> RouteManagerBuilder {
        RouteManagerBuilder::new()
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// Re-read both configuration sources and swap the registry snapshot.
    /// Breakers and caches survive a reload; endpoints are never deleted
    /// at runtime.
    pub fn reload(&self) {
        let db = self
            .store
            .as_deref()
            .map(EndpointRegistry::load_from_store)
            .unwrap_or_default();
        let yaml = self
            .yaml_path
            .as_deref()
            .map(EndpointRegistry::load_from_yaml)
            .unwrap_or_default();
        self.registry.reload(EndpointRegistry::merge(db, yaml));
    }

    /// Register (or replace) the upstream fetch function for an endpoint.
    pub fn register_fetcher(
        &self,
        endpoint_name: impl Into<String>,
        fetcher: Arc<dyn EndpointFetcher>,
    ) {
        let mut fetchers = self
            .fetchers
            .write()
            .expect("fetcher table lock poisoned");
        fetchers.insert(endpoint_name.into(), fetcher);
    }

    pub fn best_endpoint(&self, data_category: &str) -> Option<EndpointConfig> {
        self.router.best_endpoint(data_category)
    }

    pub fn find_endpoints(&self, filter: &EndpointFilter) -> Vec<EndpointConfig> {
        self.router.find_endpoints(filter)
    }

    /// One logical call: cache, then breaker-guarded upstream fetch, then
    /// health/cache bookkeeping. Errors are surfaced to the caller; only
    /// background refresh failures are silent.
    pub async fn invoke(
        &self,
        endpoint_name: &str,
        params: Params,
    ) -> Result<Value, InvokeError> {
        let Some(config) = self.registry.get(endpoint_name) else {
            return Err(InvokeError::UnknownEndpoint {
                endpoint: endpoint_name.to_owned(),
            });
        };

        let key = cache_key(endpoint_name, &params);
        let cache = self.cache_for(endpoint_name);
        if let Some(value) = cache.get(&key).await {
            return Ok(value);
        }

        let fetcher = {
            let fetchers = self.fetchers.read().expect("fetcher table lock poisoned");
            fetchers.get(endpoint_name).cloned()
        };
        let Some(fetcher) = fetcher else {
            return Err(InvokeError::NoFetcher {
                endpoint: endpoint_name.to_owned(),
            });
        };

        let breaker = self.breaker_for(endpoint_name);
        let started = Instant::now();
        let call_fetcher = Arc::clone(&fetcher);
        let call_params = params.clone();
        let result = breaker
            .call(move || async move { call_fetcher.fetch(call_params).await })
            .await;

        match result {
            Ok(value) => {
                let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
                self.registry.record_success(endpoint_name, elapsed_ms);

                let ttl = endpoint_ttl(&config, self.config.cache.default_ttl);
                let refresh = refresh_fn(fetcher, params);
                cache.set(&key, value.clone(), Some(ttl), Some(refresh)).await;
                Ok(value)
            }
            Err(BreakerError::Open { retry_in }) => {
                self.registry.record_failure(endpoint_name);
                Err(InvokeError::CircuitOpen {
                    endpoint: endpoint_name.to_owned(),
                    retry_in,
                })
            }
            Err(BreakerError::Fetch(error)) => {
                self.registry.record_failure(endpoint_name);
                Err(InvokeError::Upstream(error))
            }
        }
    }

    /// Route a category to its best endpoint and invoke it.
    pub async fn invoke_best(
        &self,
        data_category: &str,
        params: Params,
    ) -> Result<Value, InvokeError> {
        let Some(config) = self.best_endpoint(data_category) else {
            return Err(InvokeError::NoEndpoint {
                category: data_category.to_owned(),
            });
        };
        self.invoke(&config.endpoint_name, params).await
    }

    /// Tabular snapshot for operator dashboards, ordered by category then
    /// routing rank.
    pub fn list_endpoints(&self) -> Vec<EndpointSummary> {
        let mut snapshot = self.registry.snapshot();
        snapshot.sort_by(|left, right| {
            left.data_category
                .cmp(&right.data_category)
                .then_with(|| left.priority.cmp(&right.priority))
                .then_with(|| left.endpoint_name.cmp(&right.endpoint_name))
        });

        let breakers = self.breakers.lock().expect("breaker table lock poisoned");
        snapshot
            .into_iter()
            .map(|config| EndpointSummary {
                breaker_state: breakers
                    .get(&config.endpoint_name)
                    .map(|breaker| breaker.state().as_str()),
                last_success_time: config
                    .last_success_time
                    .and_then(|ts| ts.format(&Rfc3339).ok()),
                endpoint_name: config.endpoint_name,
                source_name: config.source_name,
                data_category: config.data_category,
                priority: config.priority,
                quality_score: config.quality_score,
                status: config.status.as_str(),
                health_status: config.health_status.as_str(),
                success_rate: config.success_rate,
                avg_response_time_ms: config.avg_response_time_ms,
                consecutive_failures: config.consecutive_failures,
            })
            .collect()
    }

    pub fn breaker_stats(&self, endpoint_name: &str) -> Option<CircuitStats> {
        let breakers = self.breakers.lock().expect("breaker table lock poisoned");
        breakers.get(endpoint_name).map(|breaker| breaker.stats())
    }

    /// Operator escape hatch: force an endpoint's circuit closed.
    pub fn reset_breaker(&self, endpoint_name: &str) -> bool {
        let breakers = self.breakers.lock().expect("breaker table lock poisoned");
        match breakers.get(endpoint_name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    pub async fn cache_stats(&self, endpoint_name: &str) -> Option<CacheStats> {
        let cache = {
            let caches = self.caches.lock().expect("cache table lock poisoned");
            caches.get(endpoint_name).cloned()
        };
        match cache {
            Some(cache) => Some(cache.stats().await),
            None => None,
        }
    }

    fn breaker_for(&self, endpoint_name: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().expect("breaker table lock poisoned");
        Arc::clone(
            breakers
                .entry(endpoint_name.to_owned())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config.breaker))),
        )
    }

    fn cache_for(&self, endpoint_name: &str) -> SmartCache<Value> {
        let mut caches = self.caches.lock().expect("cache table lock poisoned");
        caches
            .entry(endpoint_name.to_owned())
            .or_insert_with(|| SmartCache::new(self.config.cache))
            .clone()
    }
}

/// Deterministic cache key for one `(endpoint, args)` pair. `Params` is an
/// ordered map, so equal parameter sets serialize identically.
fn cache_key(endpoint_name: &str, params: &Params) -> String {
    let serialized = serde_json::to_string(params)
        .expect("ordered string-keyed params always serialize");
    format!("{endpoint_name}::{serialized}")
}

fn endpoint_ttl(config: &EndpointConfig, default_ttl: Duration) -> Duration {
    config
        .source_config
        .get(CACHE_TTL_KEY)
        .and_then(Value::as_u64)
        .map(Duration::from_secs)
        .unwrap_or(default_ttl)
}

fn refresh_fn(fetcher: Arc<dyn EndpointFetcher>, params: Params) -> RefreshFn<Value> {
    Arc::new(move || {
        let fetcher = Arc::clone(&fetcher);
        let params = params.clone();
        Box::pin(async move { fetcher.fetch(params).await })
    })
}
