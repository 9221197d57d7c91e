// Shared fixtures for tickroute behavior tests.
pub use std::sync::atomic::{AtomicUsize, Ordering};
pub use std::sync::Arc;
pub use std::time::Duration;

use serde_json::Value;
use tickroute_core::{EndpointFetcher, FetchError, FetcherFn, Params};

/// Fetcher that returns `payload` and counts invocations.
pub fn ok_fetcher(counter: Arc<AtomicUsize>, payload: &str) -> Arc<dyn EndpointFetcher> {
    let payload = payload.to_owned();
    Arc::new(FetcherFn(move |_params: Params| {
        counter.fetch_add(1, Ordering::SeqCst);
        let payload = payload.clone();
        async move { Ok(Value::String(payload)) }
    }))
}

/// Fetcher that always fails with an `unavailable` error.
pub fn down_fetcher(counter: Arc<AtomicUsize>) -> Arc<dyn EndpointFetcher> {
    Arc::new(FetcherFn(move |_params: Params| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { Err::<Value, _>(FetchError::unavailable("provider down")) }
    }))
}

/// Fetcher that fails `failures` times, then succeeds with `payload`.
pub fn flaky_fetcher(
    counter: Arc<AtomicUsize>,
    failures: usize,
    payload: &str,
) -> Arc<dyn EndpointFetcher> {
    let payload = payload.to_owned();
    Arc::new(FetcherFn(move |_params: Params| {
        let call = counter.fetch_add(1, Ordering::SeqCst);
        let payload = payload.clone();
        async move {
            if call < failures {
                Err(FetchError::unavailable("provider warming up"))
            } else {
                Ok(Value::String(payload))
            }
        }
    }))
}
