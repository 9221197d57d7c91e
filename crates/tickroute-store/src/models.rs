use serde::{Deserialize, Serialize};

/// One `endpoint_configs` row as stored in DuckDB.
///
/// Enum-like columns (`status`, `health_status`) and JSON-typed columns
/// (`parameters`, `tags`, ...) are kept as strings here; `tickroute-core`
/// converts rows into its typed `EndpointConfig`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointRow {
    pub endpoint_name: String,
    pub source_name: String,
    pub data_category: String,
    pub target_db: Option<String>,
    pub priority: u32,
    pub quality_score: u8,
    pub status: String,
    pub health_status: String,
    pub success_rate: f64,
    pub avg_response_time_ms: f64,
    pub consecutive_failures: u32,
    pub total_calls: u64,
    pub total_successes: u64,
    /// RFC3339 UTC timestamp, when the endpoint last succeeded.
    pub last_success_time: Option<String>,
    /// JSON object of default call parameters.
    pub parameters: serde_json::Value,
    pub description: String,
    /// JSON object of parameters used by connectivity probes.
    pub test_parameters: serde_json::Value,
    /// Provider-specific JSON settings (opaque to the store).
    pub source_config: serde_json::Value,
    /// JSON object of data-quality rules.
    pub quality_rules: serde_json::Value,
    pub update_schedule: Option<String>,
    pub business_scene: Option<String>,
    pub tags: Vec<String>,
    pub version: Option<String>,
}

impl EndpointRow {
    /// Minimal active row used by fixtures and tests.
    pub fn active(
        endpoint_name: impl Into<String>,
        source_name: impl Into<String>,
        data_category: impl Into<String>,
        priority: u32,
    ) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            source_name: source_name.into(),
            data_category: data_category.into(),
            target_db: None,
            priority,
            quality_score: 80,
            status: String::from("active"),
            health_status: String::from("healthy"),
            success_rate: 1.0,
            avg_response_time_ms: 0.0,
            consecutive_failures: 0,
            total_calls: 0,
            total_successes: 0,
            last_success_time: None,
            parameters: serde_json::Value::Object(serde_json::Map::new()),
            description: String::new(),
            test_parameters: serde_json::Value::Object(serde_json::Map::new()),
            source_config: serde_json::Value::Object(serde_json::Map::new()),
            quality_rules: serde_json::Value::Object(serde_json::Map::new()),
            update_schedule: None,
            business_scene: None,
            tags: Vec::new(),
            version: None,
        }
    }
}
