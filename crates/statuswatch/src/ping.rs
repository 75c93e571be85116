//! Latency sampling against ping targets
//!
//! A sampling cycle issues a bounded number of probes against a target URL
//! and reduces the timings to summary statistics. Each attempt tries the
//! probers in order (fast HEAD first, then the tolerant resource probe) and
//! takes the elapsed time of whichever completes. The first attempt is
//! thrown away to avoid cold-connection bias.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::io::HttpClient;

/// Default per-attempt timeout for the primary probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(3000);
/// Default timeout for the fallback resource probe
pub const DEFAULT_FALLBACK_TIMEOUT: Duration = Duration::from_millis(2000);
/// Default number of attempts per sampling cycle
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Summary of one sampling cycle, all values in milliseconds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencySample {
    pub avg: u64,
    pub min: u64,
    pub max: u64,
    /// Per-attempt timings, first (cold) attempt excluded
    pub times: Vec<u64>,
}

/// Scaling and classification policy for latency readings.
///
/// `scale` divides every raw millisecond reading before statistics are
/// computed, so avg, min, max and the individual samples shift together and
/// keep their ordering. Thresholds classify the final average.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyPolicy {
    pub scale: f64,
    pub excellent_ms: u64,
    pub good_ms: u64,
    pub ok_ms: u64,
}

impl Default for LatencyPolicy {
    fn default() -> Self {
        Self {
            scale: 1.0,
            excellent_ms: 50,
            good_ms: 100,
            ok_ms: 200,
        }
    }
}

/// Quality bucket for a latency reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingClass {
    Excellent,
    Good,
    Ok,
    Poor,
    Fail,
}

impl PingClass {
    /// CSS class name used by the rendering layer
    pub fn css_class(&self) -> &'static str {
        match self {
            PingClass::Excellent => "ping-excellent",
            PingClass::Good => "ping-good",
            PingClass::Ok => "ping-ok",
            PingClass::Poor => "ping-poor",
            PingClass::Fail => "ping-fail",
        }
    }
}

impl fmt::Display for PingClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.css_class())
    }
}

impl LatencyPolicy {
    /// Classify a sample by its average; an absent sample is a failure
    pub fn classify(&self, sample: Option<&LatencySample>) -> PingClass {
        let Some(sample) = sample else {
            return PingClass::Fail;
        };
        if sample.avg <= self.excellent_ms {
            PingClass::Excellent
        } else if sample.avg <= self.good_ms {
            PingClass::Good
        } else if sample.avg <= self.ok_ms {
            PingClass::Ok
        } else {
            PingClass::Poor
        }
    }
}

/// Formatted ping result for the rendering layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingDisplay {
    pub text: String,
    pub class: PingClass,
    pub details: Option<String>,
}

/// Format a sample the way the latency panel shows it
pub fn format_ping(policy: &LatencyPolicy, sample: Option<&LatencySample>) -> PingDisplay {
    match sample {
        None => PingDisplay {
            text: "timeout".to_string(),
            class: PingClass::Fail,
            details: None,
        },
        Some(sample) => {
            let times = sample
                .times
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join("ms, ");
            PingDisplay {
                text: format!("{}ms", sample.avg),
                class: policy.classify(Some(sample)),
                details: Some(format!(
                    "AVG: {}ms\nMin/Max: {}/{}ms\nDetails: {}ms",
                    sample.avg, sample.min, sample.max, times
                )),
            }
        }
    }
}

/// One way of completing a round-trip against a target
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait Prober: Send + Sync {
    fn name(&self) -> &str;

    /// Complete one probe round-trip, or fail within this prober's timeout
    async fn probe(&self, url: &str) -> crate::Result<()>;
}

/// Primary probe: a HEAD request. Any HTTP response counts as a completed
/// round-trip; only timing matters.
pub struct HeadProber {
    http: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl HeadProber {
    pub fn new(http: Arc<dyn HttpClient>, timeout: Duration) -> Self {
        Self { http, timeout }
    }
}

#[async_trait]
impl Prober for HeadProber {
    fn name(&self) -> &str {
        "head"
    }

    async fn probe(&self, url: &str) -> crate::Result<()> {
        match tokio::time::timeout(self.timeout, self.http.head(url)).await {
            Ok(Ok(_response)) => Ok(()),
            Ok(Err(e)) => Err(crate::StatusError::Probe(e.to_string())),
            Err(_) => Err(crate::StatusError::Probe(format!(
                "HEAD probe timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

/// Fallback probe: fetch the target as a plain resource with a cache-busting
/// query parameter. Response and error both count as a completed round-trip;
/// only the deadline fails the probe.
pub struct ResourceProber {
    http: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl ResourceProber {
    pub fn new(http: Arc<dyn HttpClient>, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    fn bust_cache(url: &str) -> String {
        let stamp = crate::cache::current_epoch_ms();
        match url::Url::parse(url) {
            Ok(mut parsed) => {
                parsed
                    .query_pairs_mut()
                    .append_pair("t", &stamp.to_string());
                parsed.to_string()
            }
            Err(_) => {
                let separator = if url.contains('?') { '&' } else { '?' };
                format!("{}{}t={}", url, separator, stamp)
            }
        }
    }
}

#[async_trait]
impl Prober for ResourceProber {
    fn name(&self) -> &str {
        "resource"
    }

    async fn probe(&self, url: &str) -> crate::Result<()> {
        let busted = Self::bust_cache(url);
        match tokio::time::timeout(self.timeout, self.http.get(&busted)).await {
            Ok(_load_or_error) => Ok(()),
            Err(_) => Err(crate::StatusError::Probe(format!(
                "Resource probe timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

/// Issues sampling cycles against ping targets
pub struct LatencySampler {
    probers: Vec<Arc<dyn Prober>>,
    policy: LatencyPolicy,
}

impl fmt::Debug for LatencySampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatencySampler")
            .field("probers", &self.probers.len())
            .field("policy", &self.policy)
            .finish()
    }
}

impl LatencySampler {
    /// Sampler with the default probe pair (HEAD, then resource fallback)
    pub fn new(http: Arc<dyn HttpClient>, policy: LatencyPolicy) -> Self {
        Self::with_timeouts(http, policy, DEFAULT_PROBE_TIMEOUT, DEFAULT_FALLBACK_TIMEOUT)
    }

    pub fn with_timeouts(
        http: Arc<dyn HttpClient>,
        policy: LatencyPolicy,
        probe_timeout: Duration,
        fallback_timeout: Duration,
    ) -> Self {
        let probers: Vec<Arc<dyn Prober>> = vec![
            Arc::new(HeadProber::new(Arc::clone(&http), probe_timeout)),
            Arc::new(ResourceProber::new(http, fallback_timeout)),
        ];
        Self { probers, policy }
    }

    /// Sampler over an explicit prober chain, tried in order per attempt
    pub fn with_probers(probers: Vec<Arc<dyn Prober>>, policy: LatencyPolicy) -> Self {
        Self { probers, policy }
    }

    pub fn policy(&self) -> &LatencyPolicy {
        &self.policy
    }

    /// Run one sampling cycle of `attempts` probes against `url`.
    ///
    /// The first attempt never contributes to statistics. Attempts where
    /// every prober fails are skipped. Returns `None` when no attempt
    /// produced a usable timing.
    pub async fn sample(&self, url: &str, attempts: u32) -> Option<LatencySample> {
        let mut raw_times: Vec<f64> = Vec::new();

        for attempt in 0..attempts {
            let start = tokio::time::Instant::now();
            let mut completed = false;

            for prober in &self.probers {
                match prober.probe(url).await {
                    Ok(()) => {
                        completed = true;
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(
                            "Probe '{}' against {} failed: {}",
                            prober.name(),
                            url,
                            e
                        );
                    }
                }
            }

            if completed && attempt > 0 {
                raw_times.push(start.elapsed().as_secs_f64() * 1000.0);
            }
        }

        if raw_times.is_empty() {
            tracing::debug!("No usable probe timings for {}", url);
            return None;
        }

        let scale = if self.policy.scale > 0.0 {
            self.policy.scale
        } else {
            1.0
        };
        let times: Vec<u64> = raw_times.iter().map(|t| (t / scale).round() as u64).collect();

        let min = times.iter().copied().min().unwrap_or(0);
        let max = times.iter().copied().max().unwrap_or(0);
        let avg =
            (times.iter().sum::<u64>() as f64 / times.len() as f64).round() as u64;

        Some(LatencySample {
            avg,
            min,
            max,
            times,
        })
    }
}

/// Recurring latency sampling for one target, publishing each cycle's result.
///
/// Runs in the background until its cancellation token fires; teardown takes
/// effect between cycles, an in-progress cycle always finishes.
pub struct LatencyMonitor {
    sampler: Arc<LatencySampler>,
    url: String,
    attempts: u32,
    interval: Duration,
    cancel: CancellationToken,
}

impl LatencyMonitor {
    pub fn new(
        sampler: Arc<LatencySampler>,
        url: impl Into<String>,
        attempts: u32,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sampler,
            url: url.into(),
            attempts,
            interval,
            cancel,
        }
    }

    pub async fn run(self, tx: watch::Sender<Option<LatencySample>>) {
        loop {
            let sample = self.sampler.sample(&self.url, self.attempts).await;
            if tx.send(sample).is_err() {
                tracing::debug!("All latency watchers for '{}' dropped", self.url);
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Latency sampling for '{}' stopped", self.url);
                    break;
                }
            }
        }
    }
}
