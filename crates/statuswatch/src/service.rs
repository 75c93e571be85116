//! Service assembly: wires transport, coordinator, cache and sampler
//!
//! One `StatusService` is built at startup and handed to the rendering
//! layer; it owns all shared state (the pending-request registry and the
//! durable cache) so nothing in the crate is process-global.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::api::DayWindow;
use crate::cache::{CacheKey, FreshnessCache};
use crate::config::{Config, PingConfig};
use crate::coordinator::{MonitorData, RequestCoordinator};
use crate::io::HttpClient;
use crate::normalize::normalize_monitor;
use crate::ping::{LatencyMonitor, LatencySample, LatencySampler};
use crate::store::KeyValueStore;
use crate::transport::FallbackTransport;

/// Entry point for the rendering layer
pub struct StatusService {
    transport: Arc<FallbackTransport>,
    coordinator: Arc<RequestCoordinator>,
    sampler: Arc<LatencySampler>,
    ping: PingConfig,
}

impl std::fmt::Debug for StatusService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusService")
            .field("coordinator", &self.coordinator)
            .finish()
    }
}

impl StatusService {
    pub fn new(
        config: &Config,
        http: Arc<dyn HttpClient>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let cache = FreshnessCache::new(store, config.cache.policy());
        let coordinator = Arc::new(RequestCoordinator::new(cache));
        let transport = Arc::new(FallbackTransport::new(Arc::clone(&http)));
        let sampler = Arc::new(LatencySampler::with_timeouts(
            http,
            config.ping.policy(),
            config.ping.probe_timeout(),
            config.ping.fallback_timeout(),
        ));

        Self {
            transport,
            coordinator,
            sampler,
            ping: config.ping.clone(),
        }
    }

    /// Swap the transport, keeping cache and coordinator state
    pub fn with_transport(mut self, transport: FallbackTransport) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    pub fn coordinator(&self) -> &RequestCoordinator {
        &self.coordinator
    }

    /// Monitor data for one panel: served from cache when fresh, fetched
    /// (and coalesced with identical concurrent requests) otherwise.
    pub async fn monitors(&self, api_key: &str, days: u32) -> crate::Result<MonitorData> {
        let key = CacheKey::new(api_key, days);
        let window = DayWindow::ending_today(days);
        let transport = Arc::clone(&self.transport);
        let api_key = api_key.to_string();

        self.coordinator
            .get_or_fetch(key, move || async move {
                let raw = transport.fetch_monitors(&api_key, &window).await?;
                let records = raw
                    .monitors
                    .iter()
                    .map(|monitor| normalize_monitor(monitor, &window))
                    .collect::<crate::Result<Vec<_>>>()?;
                Ok((records, raw.rate_limited))
            })
            .await
    }

    /// One latency sampling cycle against `url`
    pub async fn sample_latency(&self, url: &str) -> Option<LatencySample> {
        self.sampler.sample(url, self.ping.attempts).await
    }

    pub fn latency_policy(&self) -> &crate::ping::LatencyPolicy {
        self.sampler.policy()
    }

    /// Start recurring latency sampling for `url` on the configured interval.
    ///
    /// Returns the receiver the UI watches plus the token that tears the
    /// loop down; cancellation takes effect between cycles.
    pub fn watch_latency(
        &self,
        url: &str,
    ) -> (watch::Receiver<Option<LatencySample>>, CancellationToken) {
        let cancel = CancellationToken::new();
        let monitor = LatencyMonitor::new(
            Arc::clone(&self.sampler),
            url,
            self.ping.attempts,
            self.ping.interval(),
            cancel.clone(),
        );

        let (tx, rx) = watch::channel(None);
        tokio::spawn(monitor.run(tx));

        (rx, cancel)
    }

    /// The interval between latency cycles, for callers scheduling their own
    pub fn ping_interval(&self) -> Duration {
        self.ping.interval()
    }
}
