//! End-to-end cache freshness behavior: pre-emptive refresh past the
//! threshold, stale serving under soft expiry, and single-flight refresh.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tickroute_core::{CacheConfig, RefreshFn, SmartCache};

fn cache(ttl_ms: u64, threshold: f64) -> SmartCache<String> {
    SmartCache::new(CacheConfig {
        max_size: 16,
        default_ttl: Duration::from_millis(ttl_ms),
        refresh_threshold: threshold,
        soft_expiry: true,
        refresh_workers: 5,
    })
}

fn versioned_refresh(counter: Arc<AtomicUsize>) -> RefreshFn<String> {
    Arc::new(move || {
        let version = counter.fetch_add(1, Ordering::SeqCst) + 2;
        Box::pin(async move { Ok(format!("v{version}")) })
    })
}

#[tokio::test]
async fn warm_path_refreshes_before_hard_expiry() {
    // ttl=100ms, threshold=0.5: a hit after 50ms serves the current value
    // and fetches the next one in the background.
    let cache = cache(100, 0.5);
    let refreshes = Arc::new(AtomicUsize::new(0));
    cache
        .set(
            "kline:600519",
            String::from("v1"),
            None,
            Some(versioned_refresh(Arc::clone(&refreshes))),
        )
        .await;

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(cache.get("kline:600519").await.as_deref(), Some("v1"));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(cache.get("kline:600519").await.as_deref(), Some("v2"));
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn hard_expired_entry_is_served_stale_while_refreshing() {
    let cache = cache(30, 0.9);
    let refreshes = Arc::new(AtomicUsize::new(0));
    cache
        .set(
            "quote:000001",
            String::from("v1"),
            None,
            Some(versioned_refresh(Arc::clone(&refreshes))),
        )
        .await;

    tokio::time::sleep(Duration::from_millis(60)).await;

    // Well past the TTL: still a hit, not an absence.
    assert_eq!(cache.get("quote:000001").await.as_deref(), Some("v1"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(cache.get("quote:000001").await.as_deref(), Some("v2"));
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_reads_share_one_in_flight_refresh() {
    let cache = cache(40, 0.5);
    let started = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(tokio::sync::Notify::new());

    let refresh: RefreshFn<String> = {
        let started = Arc::clone(&started);
        let gate = Arc::clone(&gate);
        Arc::new(move || {
            started.fetch_add(1, Ordering::SeqCst);
            let gate = Arc::clone(&gate);
            Box::pin(async move {
                gate.notified().await;
                Ok(String::from("fresh"))
            })
        })
    };
    cache.set("slow", String::from("stale"), None, Some(refresh)).await;

    tokio::time::sleep(Duration::from_millis(25)).await;

    // Many reads while the first refresh is still blocked on the gate,
    // spanning both the pre-emptive window and hard expiry.
    for _ in 0..8 {
        assert_eq!(cache.get("slow").await.as_deref(), Some("stale"));
        tokio::time::sleep(Duration::from_millis(3)).await;
    }
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().await.refreshes, 1);

    gate.notify_waiters();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(cache.get("slow").await.as_deref(), Some("fresh"));
    assert_eq!(cache.stats().await.refresh_failures, 0);
}

#[tokio::test]
async fn refreshed_entries_keep_refreshing_on_later_cycles() {
    // The refresh writes back through `set` without a refresh function;
    // the original one must survive so the entry stays self-refreshing.
    let cache = cache(40, 0.5);
    let refreshes = Arc::new(AtomicUsize::new(0));
    cache
        .set(
            "cycling",
            String::from("v1"),
            None,
            Some(versioned_refresh(Arc::clone(&refreshes))),
        )
        .await;

    tokio::time::sleep(Duration::from_millis(28)).await;
    assert_eq!(cache.get("cycling").await.as_deref(), Some("v1"));

    tokio::time::sleep(Duration::from_millis(27)).await;
    assert_eq!(cache.get("cycling").await.as_deref(), Some("v2"));

    tokio::time::sleep(Duration::from_millis(27)).await;
    assert_eq!(cache.get("cycling").await.as_deref(), Some("v3"));
    assert!(refreshes.load(Ordering::SeqCst) >= 2);
}
