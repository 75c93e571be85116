//! Domain model for normalized monitor data

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Three-state availability of a monitored site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorStatus {
    Up,
    Down,
    Unknown,
}

impl MonitorStatus {
    /// Map the upstream numeric status code to the three-state status
    pub fn from_code(code: i64) -> Self {
        match code {
            2 => MonitorStatus::Up,
            9 => MonitorStatus::Down,
            _ => MonitorStatus::Unknown,
        }
    }
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorStatus::Up => write!(f, "up"),
            MonitorStatus::Down => write!(f, "down"),
            MonitorStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Outage tally: number of incidents and their summed duration in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outage {
    pub times: u32,
    pub duration: u64,
}

/// Availability and outage figures for one calendar day (UTC)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayStat {
    pub date: NaiveDate,
    pub uptime: f64,
    pub down: Outage,
}

/// One monitored site, normalized into per-day availability
///
/// `daily` holds one entry per requested day, oldest first; the aggregate
/// whole-window range is folded into `average` instead of occupying a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorRecord {
    pub id: u64,
    pub name: String,
    pub url: String,
    pub average: f64,
    pub daily: Vec<DayStat>,
    pub total: Outage,
    pub status: MonitorStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_three_states() {
        assert_eq!(MonitorStatus::from_code(2), MonitorStatus::Up);
        assert_eq!(MonitorStatus::from_code(9), MonitorStatus::Down);
        assert_eq!(MonitorStatus::from_code(0), MonitorStatus::Unknown);
        assert_eq!(MonitorStatus::from_code(1), MonitorStatus::Unknown);
        assert_eq!(MonitorStatus::from_code(8), MonitorStatus::Unknown);
    }

    #[test]
    fn status_displays_lowercase() {
        assert_eq!(MonitorStatus::Up.to_string(), "up");
        assert_eq!(MonitorStatus::Down.to_string(), "down");
        assert_eq!(MonitorStatus::Unknown.to_string(), "unknown");
    }

    #[test]
    fn day_stat_date_roundtrips_through_string_form() {
        let stat = DayStat {
            date: NaiveDate::from_ymd_opt(2026, 8, 8).unwrap(),
            uptime: 99.98,
            down: Outage::default(),
        };
        let json = serde_json::to_string(&stat).unwrap();
        assert!(json.contains(r#""date":"2026-08-08""#));
        let back: DayStat = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stat);
    }

    #[test]
    fn day_stat_rejects_malformed_date() {
        let json = r#"{"date":"not-a-date","uptime":100.0,"down":{"times":0,"duration":0}}"#;
        assert!(serde_json::from_str::<DayStat>(json).is_err());
    }
}
