//! Freshness cache for fetched monitor datasets
//!
//! Fetched datasets are kept in durable key-value storage so a reload does
//! not cost another upstream round-trip. Entries carry their fetch time and
//! a rate-limited marker; a rate-limited entry stays fresh three times as
//! long to take pressure off the upstream API for that key only.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::monitor::MonitorRecord;
use crate::store::KeyValueStore;

/// Identifies one cacheable dataset: token suffix plus requested day count
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive a key from the last 8 characters of the API key and the day count
    pub fn new(api_key: &str, days: u32) -> Self {
        let suffix: String = {
            let chars: Vec<char> = api_key.chars().collect();
            let start = chars.len().saturating_sub(8);
            chars[start..].iter().collect()
        };
        Self(format!("{}_{}_days", suffix, days))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Expiry policy and storage namespace for the cache
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// Freshness window for a normally fetched entry
    pub fresh: Duration,
    /// Freshness window for an entry fetched under rate limiting
    pub fresh_rate_limited: Duration,
    /// Storage key prefix; bump it when the stored shape changes so old
    /// entries read as a miss instead of failing deserialization forever
    pub prefix: String,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            fresh: Duration::from_secs(5 * 60),
            fresh_rate_limited: Duration::from_secs(15 * 60),
            prefix: "uptimerobot_cache".to_string(),
        }
    }
}

/// One cached dataset with its fetch metadata
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub data: Vec<MonitorRecord>,
    pub fetched_at_ms: u64,
    pub rate_limited: bool,
}

/// Persisted shape of a cache entry
#[derive(Serialize, Deserialize)]
struct StoredEntry {
    data: Vec<MonitorRecord>,
    timestamp: u64,
    #[serde(default)]
    rate_limited: bool,
}

/// Durable, keyed cache of monitor datasets with per-entry freshness
#[derive(Clone)]
pub struct FreshnessCache {
    store: Arc<dyn KeyValueStore>,
    policy: CachePolicy,
}

impl fmt::Debug for FreshnessCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreshnessCache")
            .field("policy", &self.policy)
            .finish()
    }
}

impl FreshnessCache {
    pub fn new(store: Arc<dyn KeyValueStore>, policy: CachePolicy) -> Self {
        Self { store, policy }
    }

    fn storage_key(&self, key: &CacheKey) -> String {
        format!("{}_{}", self.policy.prefix, key)
    }

    /// Read the entry for `key`, if present and fully deserializable.
    ///
    /// Storage failures and undecodable entries (for example a date field
    /// that no longer parses) are logged and reported as a miss; a partially
    /// decoded entry is never returned.
    pub fn read(&self, key: &CacheKey) -> Option<CacheEntry> {
        let storage_key = self.storage_key(key);
        let raw = match self.store.get(&storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Cache read for '{}' failed: {}", storage_key, e);
                return None;
            }
        };

        match serde_json::from_str::<StoredEntry>(&raw) {
            Ok(stored) => Some(CacheEntry {
                data: stored.data,
                fetched_at_ms: stored.timestamp,
                rate_limited: stored.rate_limited,
            }),
            Err(e) => {
                tracing::warn!("Discarding undecodable cache entry '{}': {}", storage_key, e);
                None
            }
        }
    }

    /// Overwrite the entry for `key`, stamping the current wall-clock time.
    ///
    /// Storage failures are logged and swallowed; the cache is an
    /// optimization, not a correctness requirement.
    pub fn write(&self, key: &CacheKey, data: &[MonitorRecord], rate_limited: bool) {
        let stored = StoredEntry {
            data: data.to_vec(),
            timestamp: current_epoch_ms(),
            rate_limited,
        };
        let storage_key = self.storage_key(key);

        let serialized = match serde_json::to_string(&stored) {
            Ok(serialized) => serialized,
            Err(e) => {
                tracing::warn!("Cache serialization for '{}' failed: {}", storage_key, e);
                return;
            }
        };

        if let Err(e) = self.store.set(&storage_key, &serialized) {
            tracing::warn!("Cache write for '{}' failed: {}", storage_key, e);
            return;
        }

        let window = if rate_limited {
            self.policy.fresh_rate_limited
        } else {
            self.policy.fresh
        };
        tracing::debug!(
            "Cached '{}' for {}s{}",
            storage_key,
            window.as_secs(),
            if rate_limited { " (rate-limit backoff)" } else { "" }
        );
    }

    /// Whether `entry` is still fresh under its own window
    pub fn is_fresh(&self, entry: &CacheEntry) -> bool {
        let window = if entry.rate_limited {
            self.policy.fresh_rate_limited
        } else {
            self.policy.fresh
        };
        let age_ms = current_epoch_ms().saturating_sub(entry.fetched_at_ms);
        let fresh = age_ms < window.as_millis() as u64;
        if fresh {
            tracing::debug!(
                "Using cached data (age {} min{})",
                age_ms / 60_000,
                if entry.rate_limited { ", rate-limit backoff" } else { "" }
            );
        }
        fresh
    }
}

/// Current wall-clock time in epoch milliseconds
pub(crate) fn current_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
