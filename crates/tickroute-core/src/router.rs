//! Endpoint selection: filter and rank registry records.

use std::sync::Arc;

use crate::endpoint::{EndpointConfig, HealthStatus};
use crate::registry::EndpointRegistry;

/// Filters for [`EndpointRouter::find_endpoints`]. Equality filters are
/// applied only when present; `only_healthy` (default true) excludes
/// endpoints whose health has degraded all the way to `Failed`.
#[derive(Debug, Clone)]
pub struct EndpointFilter {
    pub data_category: Option<String>,
    pub source_name: Option<String>,
    pub target_db: Option<String>,
    pub only_healthy: bool,
}

impl Default for EndpointFilter {
    fn default() -> Self {
        Self {
            data_category: None,
            source_name: None,
            target_db: None,
            only_healthy: true,
        }
    }
}

impl EndpointFilter {
    pub fn category(data_category: impl Into<String>) -> Self {
        Self {
            data_category: Some(data_category.into()),
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = Some(source_name.into());
        self
    }

    pub fn with_target_db(mut self, target_db: impl Into<String>) -> Self {
        self.target_db = Some(target_db.into());
        self
    }

    pub fn include_unhealthy(mut self) -> Self {
        self.only_healthy = false;
        self
    }

    fn matches(&self, config: &EndpointConfig) -> bool {
        if !config.is_routable() {
            return false;
        }
        if let Some(category) = &self.data_category {
            if &config.data_category != category {
                return false;
            }
        }
        if let Some(source) = &self.source_name {
            if &config.source_name != source {
                return false;
            }
        }
        if let Some(target_db) = &self.target_db {
            if config.target_db.as_deref() != Some(target_db.as_str()) {
                return false;
            }
        }
        if self.only_healthy && config.health_status == HealthStatus::Failed {
            return false;
        }
        true
    }
}

/// Ranks eligible endpoints for a data category.
pub struct EndpointRouter {
    registry: Arc<EndpointRegistry>,
}

impl EndpointRouter {
    pub fn new(registry: Arc<EndpointRegistry>) -> Self {
        Self { registry }
    }

    /// Eligible endpoints, ordered ascending by priority with quality
    /// score (descending) then name as tie-breaks.
    pub fn find_endpoints(&self, filter: &EndpointFilter) -> Vec<EndpointConfig> {
        let mut candidates = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|config| filter.matches(config))
            .collect::<Vec<_>>();

        candidates.sort_by(|left, right| {
            left.priority
                .cmp(&right.priority)
                .then_with(|| right.quality_score.cmp(&left.quality_score))
                .then_with(|| left.endpoint_name.cmp(&right.endpoint_name))
        });
        candidates
    }

    /// Routing winner for a category. Absence is a normal outcome, not an
    /// error; callers decide how to handle "no route".
    pub fn best_endpoint(&self, data_category: &str) -> Option<EndpointConfig> {
        self.find_endpoints(&EndpointFilter::category(data_category))
            .into_iter()
            .next()
    }
}
