// Time-windowed cache: window hits, single-flight, stale-on-error

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use homehub::error::HubError;
use homehub::window_cache::TimeWindowedCache;
use tokio::time::{Duration, advance, sleep};

const WINDOW: Duration = Duration::from_secs(10);

async fn counted_fetch(calls: &AtomicUsize, value: u32) -> Result<u32, HubError> {
    calls.fetch_add(1, Ordering::SeqCst);
    Ok(value)
}

#[tokio::test(start_paused = true)]
async fn second_call_inside_window_is_served_from_cache() {
    let cache = TimeWindowedCache::new("test");
    let calls = AtomicUsize::new(0);

    assert_eq!(cache.get(WINDOW, || counted_fetch(&calls, 1)).await, Ok(1));
    advance(Duration::from_secs(2)).await;
    assert_eq!(cache.get(WINDOW, || counted_fetch(&calls, 2)).await, Ok(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_entry_is_refetched() {
    let cache = TimeWindowedCache::new("test");
    let calls = AtomicUsize::new(0);

    cache.get(WINDOW, || counted_fetch(&calls, 1)).await.unwrap();
    advance(Duration::from_secs(11)).await;
    assert_eq!(cache.get(WINDOW, || counted_fetch(&calls, 2)).await, Ok(2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_fetch() {
    let cache = Arc::new(TimeWindowedCache::new("test"));
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let cache = cache.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            cache
                .get(WINDOW, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_secs(1)).await;
                    Ok::<_, HubError>(42u32)
                })
                .await
        }));
    }
    for h in handles {
        assert_eq!(h.await.unwrap(), Ok(42));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failure_without_previous_value_propagates() {
    let cache: TimeWindowedCache<u32> = TimeWindowedCache::new("test");
    let err = cache
        .get(WINDOW, || async { Err(HubError::network("inverter", "timeout")) })
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::Network { .. }));
    assert!(cache.peek().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn failure_serves_stale_value_and_retries_next_call() {
    let cache = TimeWindowedCache::new("test");
    let calls = AtomicUsize::new(0);
    cache.get(WINDOW, || counted_fetch(&calls, 7)).await.unwrap();
    advance(Duration::from_secs(11)).await;

    let stale = cache
        .get(WINDOW, || async { Err(HubError::network("inverter", "timeout")) })
        .await;
    assert_eq!(stale, Ok(7));

    // Still expired: the next call goes upstream again.
    assert_eq!(cache.get(WINDOW, || counted_fetch(&calls, 8)).await, Ok(8));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn replace_resets_the_window() {
    let cache = TimeWindowedCache::new("test");
    let calls = AtomicUsize::new(0);
    cache.replace(5u32, WINDOW).await;
    assert_eq!(cache.get(WINDOW, || counted_fetch(&calls, 6)).await, Ok(5));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(cache.peek().await.map(|e| e.value), Some(5));
}
