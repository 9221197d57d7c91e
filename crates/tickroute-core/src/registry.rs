//! Endpoint registry: configuration sources and merge policy.
//!
//! Records come from two places: the DuckDB `endpoint_configs` table (the
//! authoritative side, including accumulated health) and a declarative
//! YAML file keyed under `data_sources:`. Either source may be missing or
//! broken; registry construction never fails the process and an empty
//! registry is valid (the router simply finds no route).

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::endpoint::{EndpointConfig, EndpointStatus, HealthPolicy, HealthStatus};
use crate::error::RegistryError;
use tickroute_store::ConfigStore;

/// One `data_sources:` entry in the YAML file. Every field is optional:
/// on key collision with a database record only the override allow-list
/// is applied, and only for fields actually present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct YamlEndpoint {
    pub source_name: Option<String>,
    pub data_category: Option<String>,
    pub target_db: Option<String>,
    pub priority: Option<u32>,
    pub quality_score: Option<u8>,
    pub status: Option<String>,
    pub parameters: Option<Value>,
    pub description: Option<String>,
    pub test_parameters: Option<Value>,
    pub source_config: Option<Value>,
    pub quality_rules: Option<Value>,
    pub update_schedule: Option<String>,
    pub business_scene: Option<String>,
    pub tags: Option<Vec<String>>,
    pub version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlConfigFile {
    #[serde(default)]
    data_sources: HashMap<String, YamlEndpoint>,
}

impl YamlEndpoint {
    /// Build a full record for a key that exists only in YAML.
    fn into_config(self, endpoint_name: &str) -> EndpointConfig {
        let mut config = EndpointConfig::new(
            endpoint_name,
            self.source_name.unwrap_or_default(),
            self.data_category.unwrap_or_default(),
            self.priority.unwrap_or(100),
        );
        if let Some(score) = self.quality_score {
            config.quality_score = score.min(100);
        }
        if let Some(status) = self.status {
            config.status = status.parse().unwrap_or(EndpointStatus::Active);
        }
        config.target_db = self.target_db;
        apply_overrides(
            &mut config,
            &Self {
                parameters: self.parameters,
                description: self.description,
                test_parameters: self.test_parameters,
                source_config: self.source_config,
                quality_rules: self.quality_rules,
                update_schedule: self.update_schedule,
                business_scene: self.business_scene,
                tags: self.tags,
                version: self.version,
                ..Self::default()
            },
        );
        config
    }
}

/// Overwrite the fixed allow-list of override-only fields from YAML onto a
/// database record. Identity, routing, and health fields stay DB-owned;
/// operators rely on exactly this list, so it is not extended.
fn apply_overrides(config: &mut EndpointConfig, yaml: &YamlEndpoint) {
    if let Some(parameters) = &yaml.parameters {
        config.parameters = parameters.clone();
    }
    if let Some(description) = &yaml.description {
        config.description = description.clone();
    }
    if let Some(test_parameters) = &yaml.test_parameters {
        config.test_parameters = test_parameters.clone();
    }
    if let Some(source_config) = &yaml.source_config {
        config.source_config = source_config.clone();
    }
    if let Some(quality_rules) = &yaml.quality_rules {
        config.quality_rules = quality_rules.clone();
    }
    if let Some(update_schedule) = &yaml.update_schedule {
        config.update_schedule = Some(update_schedule.clone());
    }
    if let Some(business_scene) = &yaml.business_scene {
        config.business_scene = Some(business_scene.clone());
    }
    if let Some(tags) = &yaml.tags {
        config.tags = tags.clone();
    }
    if let Some(version) = &yaml.version {
        config.version = Some(version.clone());
    }
}

/// Authoritative, queryable set of endpoint records.
pub struct EndpointRegistry {
    endpoints: RwLock<HashMap<String, Arc<RwLock<EndpointConfig>>>>,
    policy: HealthPolicy,
}

impl EndpointRegistry {
    pub fn new(policy: HealthPolicy) -> Self {
        Self {
            endpoints: RwLock::new(HashMap::new()),
            policy,
        }
    }

    /// Build a registry from both configuration sources.
    pub fn from_sources(
        db: HashMap<String, EndpointConfig>,
        yaml: HashMap<String, YamlEndpoint>,
        policy: HealthPolicy,
    ) -> Self {
        let registry = Self::new(policy);
        registry.reload(Self::merge(db, yaml));
        registry
    }

    /// Read `status = 'active'` rows from the config store. Connectivity
    /// failures degrade to an empty map; the registry still works from
    /// YAML alone.
    pub fn load_from_store(store: &ConfigStore) -> HashMap<String, EndpointConfig> {
        match store.load_active() {
            Ok(rows) => rows
                .into_iter()
                .map(|row| {
                    let config = EndpointConfig::from(row);
                    (config.endpoint_name.clone(), config)
                })
                .collect(),
            Err(error) => {
                warn!(error = %error, "endpoint config store unavailable, continuing without it");
                HashMap::new()
            }
        }
    }

    /// Parse the YAML source. Missing file or parse error degrades to an
    /// empty map.
    pub fn load_from_yaml(path: &Path) -> HashMap<String, YamlEndpoint> {
        match Self::try_load_from_yaml(path) {
            Ok(entries) => entries,
            Err(error) => {
                warn!(error = %error, "endpoint YAML source unavailable, continuing without it");
                HashMap::new()
            }
        }
    }

    pub fn try_load_from_yaml(
        path: &Path,
    ) -> Result<HashMap<String, YamlEndpoint>, RegistryError> {
        let raw = std::fs::read_to_string(path).map_err(|error| RegistryError::YamlRead {
            path: path.display().to_string(),
            message: error.to_string(),
        })?;
        let file: YamlConfigFile =
            serde_yaml::from_str(&raw).map_err(|error| RegistryError::YamlParse {
                path: path.display().to_string(),
                message: error.to_string(),
            })?;
        Ok(file.data_sources)
    }

    /// Merge the two sources into one map keyed by endpoint name.
    ///
    /// Database records win on collision except for the YAML override
    /// allow-list; keys present only in YAML are inserted as-is.
    pub fn merge(
        mut db: HashMap<String, EndpointConfig>,
        yaml: HashMap<String, YamlEndpoint>,
    ) -> HashMap<String, EndpointConfig> {
        for (name, entry) in yaml {
            match db.get_mut(&name) {
                Some(config) => apply_overrides(config, &entry),
                None => {
                    db.insert(name.clone(), entry.into_config(&name));
                }
            }
        }
        db
    }

    /// Replace the whole registry in one write. Readers see either the old
    /// or the new map, never a partial mix.
    pub fn reload(&self, merged: HashMap<String, EndpointConfig>) {
        let wrapped = merged
            .into_iter()
            .map(|(name, config)| (name, Arc::new(RwLock::new(config))))
            .collect::<HashMap<_, _>>();
        info!(endpoints = wrapped.len(), "endpoint registry loaded");
        let mut endpoints = self.write_endpoints();
        *endpoints = wrapped;
    }

    /// Cloned view of every record, for routing and snapshots.
    pub fn snapshot(&self) -> Vec<EndpointConfig> {
        let endpoints = self.read_endpoints();
        endpoints
            .values()
            .map(|record| record.read().expect("endpoint record lock poisoned").clone())
            .collect()
    }

    pub fn get(&self, endpoint_name: &str) -> Option<EndpointConfig> {
        let endpoints = self.read_endpoints();
        endpoints
            .get(endpoint_name)
            .map(|record| record.read().expect("endpoint record lock poisoned").clone())
    }

    pub fn len(&self) -> usize {
        self.read_endpoints().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_endpoints().is_empty()
    }

    pub fn policy(&self) -> HealthPolicy {
        self.policy
    }

    /// Record a successful call against an endpoint's health fields.
    pub fn record_success(&self, endpoint_name: &str, response_time_ms: f64) -> bool {
        self.with_record(endpoint_name, |config| {
            config.record_success(response_time_ms);
        })
    }

    /// Record a failed call; health degrades past the policy thresholds.
    pub fn record_failure(&self, endpoint_name: &str) -> bool {
        let policy = self.policy;
        self.with_record(endpoint_name, |config| {
            config.record_failure(policy);
            if config.health_status == HealthStatus::Failed {
                warn!(
                    endpoint = %config.endpoint_name,
                    consecutive_failures = config.consecutive_failures,
                    "endpoint marked failed"
                );
            }
        })
    }

    fn with_record(&self, endpoint_name: &str, apply: impl FnOnce(&mut EndpointConfig)) -> bool {
        let record = {
            let endpoints = self.read_endpoints();
            endpoints.get(endpoint_name).cloned()
        };
        match record {
            Some(record) => {
                let mut config = record.write().expect("endpoint record lock poisoned");
                apply(&mut config);
                true
            }
            None => false,
        }
    }

    fn read_endpoints(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<RwLock<EndpointConfig>>>> {
        self.endpoints
            .read()
            .expect("endpoint registry lock poisoned")
    }

    fn write_endpoints(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<RwLock<EndpointConfig>>>> {
        self.endpoints
            .write()
            .expect("endpoint registry lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn db_record(name: &str) -> EndpointConfig {
        let mut config = EndpointConfig::new(name, "tdx", "daily_kline", 10);
        config.health_status = HealthStatus::Degraded;
        config.success_rate = 0.93;
        config.consecutive_failures = 2;
        config.tags = vec![String::from("db-tag")];
        config.version = Some(String::from("0.9.0"));
        config
    }

    #[test]
    fn merge_keeps_db_health_and_adopts_yaml_overrides_when_present() {
        let mut db = HashMap::new();
        db.insert(String::from("tdx_daily_kline"), db_record("tdx_daily_kline"));

        let mut yaml = HashMap::new();
        yaml.insert(
            String::from("tdx_daily_kline"),
            YamlEndpoint {
                tags: Some(vec![String::from("kline"), String::from("daily")]),
                version: Some(String::from("1.1.0")),
                description: Some(String::from("daily candles via TDX")),
                priority: Some(1),
                ..YamlEndpoint::default()
            },
        );

        let merged = EndpointRegistry::merge(db, yaml);
        let record = &merged["tdx_daily_kline"];

        assert_eq!(record.health_status, HealthStatus::Degraded);
        assert!((record.success_rate - 0.93).abs() < 1e-9);
        assert_eq!(record.consecutive_failures, 2);
        assert_eq!(record.tags, vec!["kline", "daily"]);
        assert_eq!(record.version.as_deref(), Some("1.1.0"));
        assert_eq!(record.description, "daily candles via TDX");
        // priority is not on the allow-list; the DB value stays.
        assert_eq!(record.priority, 10);
    }

    #[test]
    fn merge_keeps_db_fields_when_yaml_omits_them() {
        let mut db = HashMap::new();
        db.insert(String::from("tdx_daily_kline"), db_record("tdx_daily_kline"));

        let mut yaml = HashMap::new();
        yaml.insert(String::from("tdx_daily_kline"), YamlEndpoint::default());

        let merged = EndpointRegistry::merge(db, yaml);
        let record = &merged["tdx_daily_kline"];
        assert_eq!(record.tags, vec!["db-tag"]);
        assert_eq!(record.version.as_deref(), Some("0.9.0"));
    }

    #[test]
    fn merge_inserts_yaml_only_keys() {
        let mut yaml = HashMap::new();
        yaml.insert(
            String::from("ak_realtime_quote"),
            YamlEndpoint {
                source_name: Some(String::from("akshare")),
                data_category: Some(String::from("realtime_quote")),
                priority: Some(5),
                quality_score: Some(70),
                tags: Some(vec![String::from("quote")]),
                ..YamlEndpoint::default()
            },
        );

        let merged = EndpointRegistry::merge(HashMap::new(), yaml);
        let record = &merged["ak_realtime_quote"];
        assert_eq!(record.source_name, "akshare");
        assert_eq!(record.priority, 5);
        assert_eq!(record.quality_score, 70);
        assert_eq!(record.status, EndpointStatus::Active);
        assert_eq!(record.health_status, HealthStatus::Healthy);
    }

    #[test]
    fn yaml_parse_round_trip() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            "data_sources:\n\
             \x20 ak_realtime_quote:\n\
             \x20   source_name: akshare\n\
             \x20   data_category: realtime_quote\n\
             \x20   priority: 3\n\
             \x20   tags: [quote, realtime]\n\
             \x20   parameters:\n\
             \x20     market: sh\n"
        )
        .expect("write yaml");

        let entries =
            EndpointRegistry::try_load_from_yaml(file.path()).expect("yaml parses");
        assert_eq!(entries.len(), 1);
        let entry = &entries["ak_realtime_quote"];
        assert_eq!(entry.priority, Some(3));
        assert_eq!(entry.parameters.as_ref().unwrap()["market"], "sh");
    }

    #[test]
    fn missing_or_broken_yaml_degrades_to_empty() {
        let missing = EndpointRegistry::load_from_yaml(Path::new("/nonexistent/endpoints.yaml"));
        assert!(missing.is_empty());

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "data_sources: [not, a, map").expect("write yaml");
        let broken = EndpointRegistry::load_from_yaml(file.path());
        assert!(broken.is_empty());
    }

    #[test]
    fn reload_replaces_the_whole_map() {
        let registry = EndpointRegistry::new(HealthPolicy::default());
        let mut first = HashMap::new();
        first.insert(
            String::from("old_endpoint"),
            EndpointConfig::new("old_endpoint", "tdx", "daily_kline", 1),
        );
        registry.reload(first);
        assert!(registry.get("old_endpoint").is_some());

        let mut second = HashMap::new();
        second.insert(
            String::from("new_endpoint"),
            EndpointConfig::new("new_endpoint", "akshare", "daily_kline", 1),
        );
        registry.reload(second);

        assert!(registry.get("old_endpoint").is_none());
        assert!(registry.get("new_endpoint").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn health_updates_flow_through_the_registry() {
        let registry = EndpointRegistry::new(HealthPolicy {
            degraded_after: 1,
            failed_after: 2,
        });
        let mut map = HashMap::new();
        map.insert(
            String::from("ef_kline"),
            EndpointConfig::new("ef_kline", "efinance", "daily_kline", 1),
        );
        registry.reload(map);

        assert!(registry.record_failure("ef_kline"));
        assert_eq!(
            registry.get("ef_kline").map(|c| c.health_status),
            Some(HealthStatus::Degraded)
        );
        assert!(registry.record_failure("ef_kline"));
        assert_eq!(
            registry.get("ef_kline").map(|c| c.health_status),
            Some(HealthStatus::Failed)
        );

        assert!(registry.record_success("ef_kline", 42.0));
        let record = registry.get("ef_kline").expect("record exists");
        assert_eq!(record.health_status, HealthStatus::Healthy);
        assert_eq!(record.consecutive_failures, 0);

        assert!(!registry.record_failure("unknown"));
    }

    #[test]
    fn load_from_store_maps_rows() {
        let store = ConfigStore::open_in_memory().expect("store");
        store
            .upsert(&tickroute_store::EndpointRow::active(
                "tdx_daily_kline",
                "tdx",
                "daily_kline",
                10,
            ))
            .expect("upsert");

        let loaded = EndpointRegistry::load_from_store(&store);
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("tdx_daily_kline"));
    }
}
