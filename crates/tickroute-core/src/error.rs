use std::fmt::{Display, Formatter};
use std::time::Duration;

use thiserror::Error;

/// Upstream fetch error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Unavailable,
    RateLimited,
    Timeout,
    InvalidRequest,
    Internal,
}

/// Structured error returned by endpoint fetch functions.
///
/// The circuit breaker only counts kinds for which [`trips_breaker`]
/// returns true; anything else passes through without touching breaker
/// state.
///
/// [`trips_breaker`]: FetchError::trips_breaker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
    retryable: bool,
}

impl FetchError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Timeout,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    /// Whether this failure counts toward opening the circuit.
    ///
    /// Caller mistakes (malformed parameters) say nothing about provider
    /// health, so they pass through uncounted.
    pub const fn trips_breaker(&self) -> bool {
        !matches!(self.kind, FetchErrorKind::InvalidRequest)
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FetchErrorKind::Unavailable => "fetch.unavailable",
            FetchErrorKind::RateLimited => "fetch.rate_limited",
            FetchErrorKind::Timeout => "fetch.timeout",
            FetchErrorKind::InvalidRequest => "fetch.invalid_request",
            FetchErrorKind::Internal => "fetch.internal",
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for FetchError {}

/// Errors surfaced by `RouteManager::invoke` and friends.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("no active endpoint found for data category '{category}'")]
    NoEndpoint { category: String },

    #[error("endpoint '{endpoint}' is not registered")]
    UnknownEndpoint { endpoint: String },

    #[error("no fetcher registered for endpoint '{endpoint}'")]
    NoFetcher { endpoint: String },

    #[error("circuit for endpoint '{endpoint}' is open, retry in {retry_in:?}")]
    CircuitOpen {
        endpoint: String,
        retry_in: Duration,
    },

    #[error(transparent)]
    Upstream(#[from] FetchError),
}

impl InvokeError {
    pub const fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }
}

/// Validation errors for endpoint configuration fields.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid endpoint status '{value}', expected one of active, inactive")]
    InvalidStatus { value: String },

    #[error("invalid health status '{value}', expected one of healthy, degraded, failed")]
    InvalidHealth { value: String },
}

/// Registry configuration-source errors. Always recovered locally (the
/// registry degrades to an empty source map); exposed for tests and logs.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read config file '{path}': {message}")]
    YamlRead { path: String, message: String },

    #[error("failed to parse config file '{path}': {message}")]
    YamlParse { path: String, message: String },
}
