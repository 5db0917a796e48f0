// Single-value cache with a validity window in front of a rate-sensitive upstream.
// The entry lock is held across the fetch, so concurrent callers of an expired
// entry queue behind one fetch and then read its result (single-flight).

use std::future::Future;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::warn;

use crate::error::HubError;

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub valid_until: Instant,
}

pub struct TimeWindowedCache<T> {
    name: &'static str,
    entry: Mutex<Option<CacheEntry<T>>>,
}

impl<T: Clone + Send> TimeWindowedCache<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entry: Mutex::new(None),
        }
    }

    /// Returns the cached value while `now < valid_until`; otherwise runs `fetch` once.
    ///
    /// On fetch failure the previous value (if any) is returned and its `valid_until`
    /// is left as is, so the next call retries. Without a previous value the error
    /// propagates.
    pub async fn get<F, Fut>(&self, window: Duration, fetch: F) -> Result<T, HubError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, HubError>>,
    {
        let mut guard = self.entry.lock().await;
        if let Some(entry) = guard.as_ref()
            && Instant::now() < entry.valid_until
        {
            return Ok(entry.value.clone());
        }

        match fetch().await {
            Ok(value) => {
                *guard = Some(CacheEntry {
                    value: value.clone(),
                    valid_until: Instant::now() + window,
                });
                Ok(value)
            }
            Err(e) => match guard.as_ref() {
                Some(stale) => {
                    warn!(cache = self.name, error = %e, "fetch failed; serving stale value");
                    Ok(stale.value.clone())
                }
                None => Err(e),
            },
        }
    }

    /// Stores a value known to be current (e.g. right after a successful device command).
    pub async fn replace(&self, value: T, window: Duration) {
        *self.entry.lock().await = Some(CacheEntry {
            value,
            valid_until: Instant::now() + window,
        });
    }

    /// Copy of the current entry, expired or not. Never fetches.
    pub async fn peek(&self) -> Option<CacheEntry<T>> {
        self.entry.lock().await.clone()
    }
}
