//! Statuswatch - client-side data layer for an uptime status dashboard
//!
//! Polls the upstream monitoring API, caches per-token datasets durably,
//! coalesces concurrent fetches, falls back through relay routes when the
//! direct route is blocked, and samples round-trip latency to ping targets.
//! The rendering layer consumes [`StatusService`] and the domain types; it
//! never talks to the upstream API or the store directly.

pub mod api;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod io;
pub mod monitor;
pub mod normalize;
pub mod ping;
pub mod proxy;
pub mod service;
pub mod store;
pub mod transport;

pub use cache::{CacheEntry, CacheKey, CachePolicy, FreshnessCache};
pub use config::{load_config, Config, TokenConfig};
pub use coordinator::{MonitorData, RequestCoordinator};
pub use error::{Result, StatusError};
pub use monitor::{DayStat, MonitorRecord, MonitorStatus, Outage};
pub use ping::{
    format_ping, LatencyPolicy, LatencySample, LatencySampler, PingClass, PingDisplay,
};
pub use service::StatusService;
