//! Endpoint configuration records and health bookkeeping.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::ValidationError;
use tickroute_store::EndpointRow;

/// Registration status. Only `Active` endpoints are eligible for routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStatus {
    Active,
    Inactive,
}

impl EndpointStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl Display for EndpointStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointStatus {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(ValidationError::InvalidStatus {
                value: other.to_owned(),
            }),
        }
    }
}

/// Observed endpoint health, maintained by the invocation handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Failed,
}

impl HealthStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        }
    }
}

impl Display for HealthStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthStatus {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "healthy" => Ok(Self::Healthy),
            "degraded" => Ok(Self::Degraded),
            "failed" => Ok(Self::Failed),
            other => Err(ValidationError::InvalidHealth {
                value: other.to_owned(),
            }),
        }
    }
}

/// Consecutive-failure thresholds at which an endpoint's health degrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    pub degraded_after: u32,
    pub failed_after: u32,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            degraded_after: 3,
            failed_after: 5,
        }
    }
}

/// One registered callable data source for one data category.
///
/// Identity and routing fields come from the configuration sources; health
/// fields are mutated by the invocation handler after each call and are
/// preserved from the database side on registry merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub endpoint_name: String,
    pub source_name: String,
    pub data_category: String,
    #[serde(default)]
    pub target_db: Option<String>,
    /// Lower value routes first.
    pub priority: u32,
    /// 0-100, descending tie-break after priority.
    pub quality_score: u8,
    pub status: EndpointStatus,
    pub health_status: HealthStatus,
    #[serde(default)]
    pub success_rate: f64,
    #[serde(default)]
    pub avg_response_time_ms: f64,
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default)]
    pub total_calls: u64,
    #[serde(default)]
    pub total_successes: u64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_success_time: Option<OffsetDateTime>,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub test_parameters: Value,
    #[serde(default)]
    pub source_config: Value,
    #[serde(default)]
    pub quality_rules: Value,
    #[serde(default)]
    pub update_schedule: Option<String>,
    #[serde(default)]
    pub business_scene: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl EndpointConfig {
    /// Minimal active record, used by tests and YAML-only entries.
    pub fn new(
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
            quality_score: 50,
            status: EndpointStatus::Active,
            health_status: HealthStatus::Healthy,
            success_rate: 1.0,
            avg_response_time_ms: 0.0,
            consecutive_failures: 0,
            total_calls: 0,
            total_successes: 0,
            last_success_time: None,
            parameters: empty_object(),
            description: String::new(),
            test_parameters: empty_object(),
            source_config: empty_object(),
            quality_rules: empty_object(),
            update_schedule: None,
            business_scene: None,
            tags: Vec::new(),
            version: None,
        }
    }

    pub fn is_routable(&self) -> bool {
        self.status == EndpointStatus::Active
    }

    /// Record a successful call: counters, running response-time mean,
    /// timestamp, and recovery back to `Healthy`.
    pub fn record_success(&mut self, response_time_ms: f64) {
        self.total_calls = self.total_calls.saturating_add(1);
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_failures = 0;
        self.health_status = HealthStatus::Healthy;
        self.last_success_time = Some(OffsetDateTime::now_utc());
        self.success_rate = self.total_successes as f64 / self.total_calls as f64;

        let successes = self.total_successes as f64;
        self.avg_response_time_ms += (response_time_ms - self.avg_response_time_ms) / successes;
    }

    /// Record a failed call, degrading health past the policy thresholds.
    pub fn record_failure(&mut self, policy: HealthPolicy) {
        self.total_calls = self.total_calls.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.success_rate = self.total_successes as f64 / self.total_calls as f64;

        if self.consecutive_failures >= policy.failed_after {
            self.health_status = HealthStatus::Failed;
        } else if self.consecutive_failures >= policy.degraded_after {
            self.health_status = HealthStatus::Degraded;
        }
    }
}

impl From<EndpointRow> for EndpointConfig {
    fn from(row: EndpointRow) -> Self {
        Self {
            status: row.status.parse().unwrap_or(EndpointStatus::Inactive),
            health_status: row.health_status.parse().unwrap_or(HealthStatus::Healthy),
            last_success_time: row
                .last_success_time
                .as_deref()
                .and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok()),
            endpoint_name: row.endpoint_name,
            source_name: row.source_name,
            data_category: row.data_category,
            target_db: row.target_db,
            priority: row.priority,
            quality_score: row.quality_score.min(100),
            success_rate: row.success_rate,
            avg_response_time_ms: row.avg_response_time_ms,
            consecutive_failures: row.consecutive_failures,
            total_calls: row.total_calls,
            total_successes: row.total_successes,
            parameters: row.parameters,
            description: row.description,
            test_parameters: row.test_parameters,
            source_config: row.source_config,
            quality_rules: row.quality_rules,
            update_schedule: row.update_schedule,
            business_scene: row.business_scene,
            tags: row.tags,
            version: row.version,
        }
    }
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}
