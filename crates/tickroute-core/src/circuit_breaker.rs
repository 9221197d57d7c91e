//! Per-endpoint circuit breaker for upstream fetch calls.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::error::FetchError;

/// Consecutive half-open successes required before the circuit closes.
const SUCCESS_THRESHOLD: u32 = 2;

/// Runtime circuit state for endpoint upstream calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

/// Error returned by [`CircuitBreaker::call`].
#[derive(Debug, Error)]
pub enum BreakerError {
    /// The circuit rejected the call without invoking the fetch function.
    #[error("circuit is open, retry in {retry_in:?}")]
    Open { retry_in: Duration },

    /// The fetch function ran and failed; breaker state was updated when
    /// the error kind counts as an upstream failure.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Counter snapshot for observability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitStats {
    pub state: CircuitState,
    pub failure_count: u32,
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_rejected: u64,
}

impl CircuitStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 1.0;
        }
        self.total_successes as f64 / self.total_calls as f64
    }
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
    total_calls: u64,
    total_successes: u64,
    total_failures: u64,
    total_rejected: u64,
}

impl Default for CircuitInner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at: None,
            total_calls: 0,
            total_successes: 0,
            total_failures: 0,
            total_rejected: 0,
        }
    }
}

/// Thread-safe circuit breaker wrapping one endpoint's upstream calls.
///
/// The mutex guards state checks and transitions only; it is never held
/// across the awaited fetch itself, so a slow upstream call cannot block
/// state queries from other tasks.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CircuitInner::default()),
        }
    }

    /// Run `f` through the breaker.
    ///
    /// Rejects immediately with [`BreakerError::Open`] while the circuit is
    /// open and the recovery timeout has not elapsed. Failures whose
    /// [`FetchError::trips_breaker`] is false propagate unchanged and leave
    /// the state machine untouched.
    pub async fn call<T, F, Fut>(&self, f: F) -> Result<T, BreakerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        {
            let mut inner = self.lock_inner();
            self.poll_open_timeout(&mut inner);
            if inner.state == CircuitState::Open {
                inner.total_rejected = inner.total_rejected.saturating_add(1);
                let retry_in = inner
                    .opened_at
                    .map(|opened_at| {
                        self.config
                            .recovery_timeout
                            .saturating_sub(opened_at.elapsed())
                    })
                    .unwrap_or(self.config.recovery_timeout);
                return Err(BreakerError::Open { retry_in });
            }
        }

        let result = f().await;

        let mut inner = self.lock_inner();
        inner.total_calls = inner.total_calls.saturating_add(1);
        match result {
            Ok(value) => {
                inner.total_successes = inner.total_successes.saturating_add(1);
                self.on_success(&mut inner);
                Ok(value)
            }
            Err(error) => {
                inner.total_failures = inner.total_failures.saturating_add(1);
                if error.trips_breaker() {
                    self.on_failure(&mut inner);
                }
                Err(BreakerError::Fetch(error))
            }
        }
    }

    /// Current state. Queries share the open-timeout code path with
    /// [`call`](Self::call), so reading the state while open and past the
    /// recovery timeout performs the transition to half-open.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock_inner();
        self.poll_open_timeout(&mut inner);
        inner.state
    }

    /// Force the circuit closed with zeroed counters. Operator escape
    /// hatch, not part of the steady-state flow.
    pub fn reset(&self) {
        let mut inner = self.lock_inner();
        *inner = CircuitInner::default();
    }

    pub fn failure_count(&self) -> u32 {
        self.lock_inner().failure_count
    }

    pub fn stats(&self) -> CircuitStats {
        let mut inner = self.lock_inner();
        self.poll_open_timeout(&mut inner);
        CircuitStats {
            state: inner.state,
            failure_count: inner.failure_count,
            total_calls: inner.total_calls,
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            total_rejected: inner.total_rejected,
        }
    }

    fn poll_open_timeout(&self, inner: &mut CircuitInner) {
        if inner.state != CircuitState::Open {
            return;
        }
        let timed_out = inner
            .opened_at
            .map(|opened_at| opened_at.elapsed() >= self.config.recovery_timeout)
            .unwrap_or(false);
        if timed_out {
            inner.state = CircuitState::HalfOpen;
            inner.opened_at = None;
            inner.success_count = 0;
        }
    }

    fn on_success(&self, inner: &mut CircuitInner) {
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.success_count = inner.success_count.saturating_add(1);
                if inner.success_count >= SUCCESS_THRESHOLD {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.opened_at = None;
                }
            }
            // A call only executes after the entry guard left Open, so a
            // success in Open means another task reopened mid-flight;
            // leave the open circuit alone.
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self, inner: &mut CircuitInner) {
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = inner.failure_count.saturating_add(1);
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.success_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, CircuitInner> {
        self.inner
            .lock()
            .expect("circuit breaker lock is not poisoned")
    }
}
