//! Request coordinator: one in-flight fetch per cache key
//!
//! Concurrent callers asking for the same dataset are coalesced onto a
//! single upstream round-trip. The pending registry is checked and updated
//! synchronously before the first suspension point, so two callers can
//! never both decide to fetch.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::cache::{CacheKey, FreshnessCache};
use crate::monitor::MonitorRecord;

/// Shared, immutable result of one fetch, handed to every waiter
pub type MonitorData = Arc<Vec<MonitorRecord>>;

type SharedFetch = Shared<BoxFuture<'static, crate::Result<MonitorData>>>;

/// Coalesces concurrent fetches per key and owns the freshness cache.
///
/// One instance is created at startup and passed to consumers; there is no
/// process-global registry.
pub struct RequestCoordinator {
    cache: FreshnessCache,
    pending: Mutex<HashMap<CacheKey, SharedFetch>>,
}

impl fmt::Debug for RequestCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCoordinator")
            .field("cache", &self.cache)
            .finish()
    }
}

impl RequestCoordinator {
    pub fn new(cache: FreshnessCache) -> Self {
        Self {
            cache,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &FreshnessCache {
        &self.cache
    }

    /// Return fresh cached data for `key`, or fetch it exactly once.
    ///
    /// `fetch` resolves to the normalized records plus the rate-limited
    /// marker for the cache write. If a fetch for `key` is already in
    /// flight, its eventual result (or error) is shared instead of issuing
    /// a second call. The pending registration is cleared when the fetch
    /// settles, success or failure; a failed fetch writes nothing.
    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, fetch: F) -> crate::Result<MonitorData>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = crate::Result<(Vec<MonitorRecord>, bool)>> + Send + 'static,
    {
        if let Some(entry) = self.cache.read(&key) {
            if self.cache.is_fresh(&entry) {
                return Ok(Arc::new(entry.data));
            }
        }

        // Check-and-register happens under the lock with no await between,
        // so at most one caller becomes the leader for this key.
        let (shared, leader) = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            match pending.get(&key) {
                Some(shared) => {
                    tracing::debug!("Joining in-flight request for '{}'", key);
                    (shared.clone(), false)
                }
                None => {
                    tracing::debug!("Cache stale or missing for '{}', fetching", key);
                    let cache = self.cache.clone();
                    let write_key = key.clone();
                    let fut = fetch();
                    let shared = async move {
                        let (records, rate_limited) = fut.await?;
                        cache.write(&write_key, &records, rate_limited);
                        Ok(Arc::new(records))
                    }
                    .boxed()
                    .shared();
                    pending.insert(key.clone(), shared.clone());
                    (shared, true)
                }
            }
        };

        let result = shared.await;

        if leader {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.remove(&key);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachePolicy;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn coordinator() -> Arc<RequestCoordinator> {
        let cache = FreshnessCache::new(Arc::new(MemoryStore::new()), CachePolicy::default());
        Arc::new(RequestCoordinator::new(cache))
    }

    fn records(average: f64) -> Vec<MonitorRecord> {
        vec![MonitorRecord {
            id: 7,
            name: "web-1".to_string(),
            url: String::new(),
            average,
            daily: Vec::new(),
            total: crate::monitor::Outage::default(),
            status: crate::monitor::MonitorStatus::Up,
        }]
    }

    #[tokio::test]
    async fn miss_fetches_and_caches() {
        let coordinator = coordinator();
        let key = CacheKey::new("token-12345678", 30);
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_in_fetch = Arc::clone(&calls);
        let data = coordinator
            .get_or_fetch(key.clone(), move || async move {
                calls_in_fetch.fetch_add(1, Ordering::SeqCst);
                Ok((records(99.9), false))
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(data[0].average, 99.9);
        assert!(coordinator.cache().read(&key).is_some());
    }

    #[tokio::test]
    async fn fresh_hit_skips_fetch() {
        let coordinator = coordinator();
        let key = CacheKey::new("token-12345678", 30);
        coordinator.cache().write(&key, &records(55.5), false);

        let data = coordinator
            .get_or_fetch(key, || async {
                Err::<(Vec<MonitorRecord>, bool), _>(crate::StatusError::Transport(
                    "fetch must not run on a fresh hit".to_string(),
                ))
            })
            .await
            .unwrap();

        assert_eq!(data[0].average, 55.5);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let coordinator = coordinator();
        let key = CacheKey::new("token-12345678", 30);
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch_for = |calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                // suspend so the other callers arrive while we are in flight
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok((records(88.8), false))
            }
        };

        let (a, b, c) = tokio::join!(
            coordinator.get_or_fetch(key.clone(), fetch_for(Arc::clone(&calls))),
            coordinator.get_or_fetch(key.clone(), fetch_for(Arc::clone(&calls))),
            coordinator.get_or_fetch(key.clone(), fetch_for(Arc::clone(&calls))),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let a = a.unwrap();
        let b = b.unwrap();
        let c = c.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
    }

    #[tokio::test]
    async fn different_keys_fetch_independently() {
        let coordinator = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch_for = |calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok((records(1.0), false))
            }
        };

        let (a, b) = tokio::join!(
            coordinator.get_or_fetch(CacheKey::new("token-aaaaaaaa", 30), fetch_for(Arc::clone(&calls))),
            coordinator.get_or_fetch(CacheKey::new("token-bbbbbbbb", 30), fetch_for(Arc::clone(&calls))),
        );

        a.unwrap();
        b.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failure_propagates_to_all_waiters_and_clears_pending() {
        let coordinator = coordinator();
        let key = CacheKey::new("token-12345678", 30);

        let failing = || async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(crate::StatusError::Transport("all routes failed".to_string()))
        };

        let (a, b) = tokio::join!(
            coordinator.get_or_fetch(key.clone(), failing),
            coordinator.get_or_fetch(key.clone(), failing),
        );

        assert!(matches!(a, Err(crate::StatusError::Transport(_))));
        assert!(matches!(b, Err(crate::StatusError::Transport(_))));
        // no partial cache write
        assert!(coordinator.cache().read(&key).is_none());

        // pending cleared: a later call runs a new fetch and succeeds
        let data = coordinator
            .get_or_fetch(key, || async { Ok((records(70.0), false)) })
            .await
            .unwrap();
        assert_eq!(data[0].average, 70.0);
    }

    #[tokio::test]
    async fn rate_limited_fetch_marks_cache_entry() {
        let coordinator = coordinator();
        let key = CacheKey::new("token-12345678", 30);

        coordinator
            .get_or_fetch(key.clone(), || async { Ok((records(10.0), true)) })
            .await
            .unwrap();

        assert!(coordinator.cache().read(&key).unwrap().rate_limited);
    }
}
