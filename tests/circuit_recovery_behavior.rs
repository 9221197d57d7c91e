//! End-to-end circuit breaker lifecycle, scaled from seconds to
//! milliseconds: open on repeated failures, reject during cooldown,
//! probe half-open, then close after two successes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tickroute_core::{
    BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitState, FetchError,
};

fn breaker(failure_threshold: u32, recovery_ms: u64) -> CircuitBreaker {
    CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold,
        recovery_timeout: Duration::from_millis(recovery_ms),
    })
}

#[tokio::test]
async fn full_lifecycle_open_cooldown_half_open_close() {
    let breaker = breaker(3, 50);
    let invocations = AtomicUsize::new(0);

    // Three matching failures trip the breaker.
    for _ in 0..3 {
        let result = breaker
            .call(|| {
                invocations.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(FetchError::unavailable("feed down")) }
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Fetch(_))));
    }
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(invocations.load(Ordering::SeqCst), 3);

    // Inside the cooldown window: rejected without touching the upstream.
    let rejected = breaker
        .call(|| {
            invocations.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, FetchError>(()) }
        })
        .await;
    assert!(matches!(rejected, Err(BreakerError::Open { .. })));
    assert_eq!(invocations.load(Ordering::SeqCst), 3);

    // Past the recovery timeout the probe call executes.
    tokio::time::sleep(Duration::from_millis(70)).await;
    let probe = breaker
        .call(|| {
            invocations.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, FetchError>(()) }
        })
        .await;
    assert!(probe.is_ok());
    assert_eq!(invocations.load(Ordering::SeqCst), 4);
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    // Second consecutive success closes the circuit.
    let close = breaker.call(|| async { Ok::<_, FetchError>(()) }).await;
    assert!(close.is_ok());
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 0);
}

#[tokio::test]
async fn open_retry_hint_shrinks_toward_zero() {
    let breaker = breaker(1, 80);

    let _ = breaker
        .call(|| async { Err::<(), _>(FetchError::timeout("slow feed")) })
        .await;
    assert_eq!(breaker.state(), CircuitState::Open);

    let first = match breaker.call(|| async { Ok::<_, FetchError>(()) }).await {
        Err(BreakerError::Open { retry_in }) => retry_in,
        other => panic!("expected open rejection, got {other:?}"),
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    let second = match breaker.call(|| async { Ok::<_, FetchError>(()) }).await {
        Err(BreakerError::Open { retry_in }) => retry_in,
        other => panic!("expected open rejection, got {other:?}"),
    };

    assert!(second < first);
    assert!(first <= Duration::from_millis(80));
}

#[tokio::test]
async fn state_query_alone_performs_the_half_open_transition() {
    let breaker = breaker(1, 20);

    let _ = breaker
        .call(|| async { Err::<(), _>(FetchError::unavailable("feed down")) })
        .await;
    assert_eq!(breaker.state(), CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(30)).await;
    // No call in between: the query itself moves the state machine.
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
}

#[tokio::test]
async fn half_open_relapse_restarts_the_cooldown() {
    let breaker = breaker(2, 40);

    for _ in 0..2 {
        let _ = breaker
            .call(|| async { Err::<(), _>(FetchError::unavailable("feed down")) })
            .await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    // One success is not enough; a failure right after reopens.
    let _ = breaker.call(|| async { Ok::<_, FetchError>(()) }).await;
    let _ = breaker
        .call(|| async { Err::<(), _>(FetchError::unavailable("still down")) })
        .await;
    assert_eq!(breaker.state(), CircuitState::Open);

    // And the subsequent recovery needs two fresh successes again.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let _ = breaker.call(|| async { Ok::<_, FetchError>(()) }).await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    let _ = breaker.call(|| async { Ok::<_, FetchError>(()) }).await;
    assert_eq!(breaker.state(), CircuitState::Closed);
}
