//! Configuration for the dashboard data layer
//!
//! Resolved once when the UI mounts and treated as read-only afterwards.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CachePolicy;
use crate::ping::LatencyPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Site title shown by the rendering layer
    #[serde(default)]
    pub site_name: String,
    /// One entry per status panel: an access token plus an optional ping target
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
    /// How many days of history each panel requests
    #[serde(default = "default_days")]
    pub days: u32,
    /// Whether panels link out to the monitored sites
    #[serde(default)]
    pub show_link: bool,
    #[serde(default)]
    pub ping: PingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_name: String::new(),
            tokens: Vec::new(),
            days: default_days(),
            show_link: false,
            ping: PingConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// One access token and its optional latency probe target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub api_key: String,
    #[serde(default)]
    pub ping_url: Option<String>,
}

/// Latency sampling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_ping_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_ping_fallback_timeout_ms")]
    pub fallback_timeout_ms: u64,
    #[serde(default = "default_ping_attempts")]
    pub attempts: u32,
    #[serde(default = "default_ping_interval_ms")]
    pub interval_ms: u64,
    /// Divisor applied to raw probe timings before statistics
    #[serde(default = "default_ping_scale")]
    pub scale: f64,
    #[serde(default = "default_excellent_ms")]
    pub excellent_ms: u64,
    #[serde(default = "default_good_ms")]
    pub good_ms: u64,
    #[serde(default = "default_ok_ms")]
    pub ok_ms: u64,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: default_ping_timeout_ms(),
            fallback_timeout_ms: default_ping_fallback_timeout_ms(),
            attempts: default_ping_attempts(),
            interval_ms: default_ping_interval_ms(),
            scale: default_ping_scale(),
            excellent_ms: default_excellent_ms(),
            good_ms: default_good_ms(),
            ok_ms: default_ok_ms(),
        }
    }
}

impl PingConfig {
    pub fn policy(&self) -> LatencyPolicy {
        LatencyPolicy {
            scale: self.scale,
            excellent_ms: self.excellent_ms,
            good_ms: self.good_ms,
            ok_ms: self.ok_ms,
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback_timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Freshness cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_fresh_secs")]
    pub fresh_secs: u64,
    #[serde(default = "default_rate_limited_secs")]
    pub rate_limited_secs: u64,
    #[serde(default = "default_cache_prefix")]
    pub prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fresh_secs: default_fresh_secs(),
            rate_limited_secs: default_rate_limited_secs(),
            prefix: default_cache_prefix(),
        }
    }
}

impl CacheConfig {
    pub fn policy(&self) -> CachePolicy {
        CachePolicy {
            fresh: Duration::from_secs(self.fresh_secs),
            fresh_rate_limited: Duration::from_secs(self.rate_limited_secs),
            prefix: self.prefix.clone(),
        }
    }
}

fn default_days() -> u32 {
    20
}

fn default_true() -> bool {
    true
}

fn default_ping_timeout_ms() -> u64 {
    3000
}

fn default_ping_fallback_timeout_ms() -> u64 {
    2000
}

fn default_ping_attempts() -> u32 {
    3
}

fn default_ping_interval_ms() -> u64 {
    15000
}

fn default_ping_scale() -> f64 {
    1.0
}

fn default_excellent_ms() -> u64 {
    50
}

fn default_good_ms() -> u64 {
    100
}

fn default_ok_ms() -> u64 {
    200
}

fn default_fresh_secs() -> u64 {
    300
}

fn default_rate_limited_secs() -> u64 {
    900
}

fn default_cache_prefix() -> String {
    "uptimerobot_cache".to_string()
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::StatusError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    serde_json::from_str(&content)
        .map_err(|e| crate::StatusError::Config(format!("Failed to parse config: {}", e)))
}
