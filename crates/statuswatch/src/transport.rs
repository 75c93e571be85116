//! Transport fallback chain for upstream monitor data
//!
//! Tries the upstream API directly first. Network-class failures and HTTP
//! 429 fall back through the relay routes, strictly one at a time in list
//! order with a fixed delay between attempts. Other failures (bad request,
//! auth, payload-level errors) fail fast without touching the relays. A 429
//! on the direct route marks the eventual result rate-limited no matter
//! which route ends up serving it.

use std::sync::Arc;
use std::time::Duration;

use crate::api::{self, DayWindow, RawMonitor};
use crate::io::{HttpClient, HttpResponse};
use crate::proxy::{default_routes, ProxyRequest, ProxyRoute};

/// Raw upstream dataset plus how it was obtained
#[derive(Debug, Clone)]
pub struct RawFetch {
    pub monitors: Vec<RawMonitor>,
    pub rate_limited: bool,
}

/// Outcome of the direct attempt
enum DirectOutcome {
    Success(Vec<RawMonitor>),
    Retry {
        rate_limited: bool,
        error: crate::StatusError,
    },
    Fatal(crate::StatusError),
}

/// Fetches raw monitor data with relay fallback
pub struct FallbackTransport {
    http: Arc<dyn HttpClient>,
    api_url: String,
    routes: Vec<ProxyRoute>,
    proxy_delay: Duration,
}

impl std::fmt::Debug for FallbackTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackTransport")
            .field("api_url", &self.api_url)
            .field("routes", &self.routes.len())
            .finish()
    }
}

impl FallbackTransport {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            api_url: api::DEFAULT_API_URL.to_string(),
            routes: default_routes(),
            proxy_delay: Duration::from_secs(1),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_routes(mut self, routes: Vec<ProxyRoute>) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_proxy_delay(mut self, delay: Duration) -> Self {
        self.proxy_delay = delay;
        self
    }

    /// Fetch the raw dataset for `api_key` over `window`
    pub async fn fetch_monitors(&self, api_key: &str, window: &DayWindow) -> crate::Result<RawFetch> {
        let params = api::monitor_request_params(api_key, window);
        let param_refs: Vec<(&str, &str)> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        tracing::debug!(
            "Direct POST {} ({} day window)",
            self.api_url,
            window.len()
        );
        let direct = self.http.post_form(&self.api_url, &param_refs).await;

        let (rate_limited, mut last_error) = match Self::evaluate_direct(direct) {
            DirectOutcome::Success(monitors) => {
                tracing::debug!("Direct route succeeded, {} monitors", monitors.len());
                return Ok(RawFetch {
                    monitors,
                    rate_limited: false,
                });
            }
            DirectOutcome::Fatal(error) => {
                tracing::debug!("Direct route failed fatally: {}", error);
                return Err(error);
            }
            DirectOutcome::Retry {
                rate_limited,
                error,
            } => {
                if rate_limited {
                    tracing::warn!("Upstream rate limit hit, extending cache retention");
                }
                tracing::debug!("Direct route failed, trying relays: {}", error);
                (rate_limited, error)
            }
        };

        let query = api::form_query(&params);

        for (i, route) in self.routes.iter().enumerate() {
            // Relays run strictly one at a time, spaced by a fixed delay.
            if i > 0 {
                tokio::time::sleep(self.proxy_delay).await;
            }

            tracing::debug!(
                "[{}/{}] Trying relay {}",
                i + 1,
                self.routes.len(),
                route.name
            );

            let response = match route.request(&self.api_url, &query) {
                ProxyRequest::Get { url } => self.http.get(&url).await,
                ProxyRequest::PostForm { url } => self.http.post_form(&url, &param_refs).await,
            };

            match Self::evaluate_relay(response) {
                Ok(monitors) => {
                    tracing::info!("Relay {} succeeded, {} monitors", route.name, monitors.len());
                    return Ok(RawFetch {
                        monitors,
                        rate_limited,
                    });
                }
                Err(error) => {
                    tracing::warn!("Relay {} failed: {}", route.name, error);
                    last_error = error;
                }
            }
        }

        Err(crate::StatusError::Transport(format!(
            "All routes to the monitoring API failed; last error: {}",
            last_error
        )))
    }

    fn evaluate_direct(result: crate::Result<HttpResponse>) -> DirectOutcome {
        match result {
            // network-class failure (unreachable, blocked, timed out)
            Err(error) => DirectOutcome::Retry {
                rate_limited: false,
                error,
            },
            Ok(response) if response.status == 429 => DirectOutcome::Retry {
                rate_limited: true,
                error: crate::StatusError::Transport(
                    "Upstream returned 429 Too Many Requests".to_string(),
                ),
            },
            Ok(response) if !is_success(response.status) => DirectOutcome::Fatal(
                crate::StatusError::Transport(format!(
                    "Upstream returned status {}",
                    response.status
                )),
            ),
            Ok(response) => match api::decode_monitors(&response.body) {
                Ok(monitors) => DirectOutcome::Success(monitors),
                Err(error) => DirectOutcome::Fatal(error),
            },
        }
    }

    fn evaluate_relay(result: crate::Result<HttpResponse>) -> crate::Result<Vec<RawMonitor>> {
        let response = result?;
        if !is_success(response.status) {
            return Err(crate::StatusError::Transport(format!(
                "Relay returned status {}",
                response.status
            )));
        }
        api::decode_monitors(&response.body)
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}
