//! Upstream monitoring API: request window, form body, and wire types
//!
//! The upstream `getMonitors` endpoint takes a form-encoded POST carrying the
//! access token, a log time window, and a dash-joined list of custom uptime
//! ranges; it answers JSON with a `stat` field and a `monitors` array.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;

/// Upstream endpoint for monitor data
pub const DEFAULT_API_URL: &str = "https://api.uptimerobot.com/v2/getMonitors";

const SECONDS_PER_DAY: i64 = 86_400;

/// The requested range of calendar days, oldest first, ending today (UTC)
///
/// Day boundaries are UTC midnights. The window drives both the upstream
/// request (uptime ranges, log window) and the normalizer's day bucketing,
/// so one window instance is built per fetch and shared by both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayWindow {
    days: Vec<NaiveDate>,
}

impl DayWindow {
    /// Window of `count` days ending at `last` (inclusive), oldest first
    pub fn ending_at(last: NaiveDate, count: u32) -> Self {
        let mut days = Vec::with_capacity(count as usize);
        for back in (0..count as i64).rev() {
            days.push(last - chrono::Duration::days(back));
        }
        Self { days }
    }

    /// Window of `count` days ending at today's UTC date
    pub fn ending_today(count: u32) -> Self {
        Self::ending_at(Utc::now().date_naive(), count)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn days(&self) -> &[NaiveDate] {
        &self.days
    }

    fn day_start(date: NaiveDate) -> i64 {
        date.and_time(NaiveTime::MIN).and_utc().timestamp()
    }

    /// Epoch second of the oldest day's UTC midnight
    pub fn start_epoch(&self) -> i64 {
        self.days.first().map(|d| Self::day_start(*d)).unwrap_or(0)
    }

    /// Epoch second of the midnight after the newest day
    pub fn end_epoch(&self) -> i64 {
        self.days
            .last()
            .map(|d| Self::day_start(*d) + SECONDS_PER_DAY)
            .unwrap_or(0)
    }

    /// Dash-joined `start_end` pairs, one per day oldest first, then one
    /// aggregate pair spanning the whole window
    pub fn uptime_ranges(&self) -> String {
        let mut ranges: Vec<String> = self
            .days
            .iter()
            .map(|d| {
                let start = Self::day_start(*d);
                format!("{}_{}", start, start + SECONDS_PER_DAY)
            })
            .collect();
        ranges.push(format!("{}_{}", self.start_epoch(), self.end_epoch()));
        ranges.join("-")
    }

    /// Calendar-day lookup: date of a day in the window to its position
    pub fn index(&self) -> HashMap<NaiveDate, usize> {
        self.days.iter().enumerate().map(|(i, d)| (*d, i)).collect()
    }

    /// The calendar day (UTC) a log timestamp falls into
    pub fn day_of_epoch(epoch: i64) -> Option<NaiveDate> {
        DateTime::from_timestamp(epoch, 0).map(|dt| dt.date_naive())
    }
}

/// Form parameters for a `getMonitors` request
pub fn monitor_request_params(api_key: &str, window: &DayWindow) -> Vec<(String, String)> {
    vec![
        ("api_key".to_string(), api_key.to_string()),
        ("format".to_string(), "json".to_string()),
        ("logs".to_string(), "1".to_string()),
        ("log_types".to_string(), "1-2".to_string()),
        (
            "logs_start_date".to_string(),
            window.start_epoch().to_string(),
        ),
        ("logs_end_date".to_string(), window.end_epoch().to_string()),
        ("custom_uptime_ranges".to_string(), window.uptime_ranges()),
    ]
}

/// Form-encode request params into a query string
pub fn form_query(params: &[(String, String)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// One log entry of a monitor (outage, recovery, ...)
#[derive(Debug, Clone, Deserialize)]
pub struct RawLog {
    #[serde(rename = "type")]
    pub log_type: i64,
    pub datetime: i64,
    pub duration: u64,
}

/// One monitor as returned by the upstream API
#[derive(Debug, Clone, Deserialize)]
pub struct RawMonitor {
    pub id: u64,
    pub friendly_name: String,
    #[serde(default)]
    pub url: String,
    pub status: i64,
    pub custom_uptime_ranges: String,
    #[serde(default)]
    pub logs: Vec<RawLog>,
}

/// Top-level upstream response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    pub stat: String,
    #[serde(default)]
    pub monitors: Vec<RawMonitor>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// Decode and validate an upstream payload.
///
/// A payload that does not decode, or whose `stat` is not `"ok"`, is an
/// upstream application failure; partial or missing fields never leak
/// past this boundary.
pub fn decode_monitors(body: &str) -> crate::Result<Vec<RawMonitor>> {
    let response: ApiResponse = serde_json::from_str(body)
        .map_err(|e| crate::StatusError::Upstream(format!("Invalid payload: {}", e)))?;

    if response.stat != "ok" {
        let detail = match &response.error {
            Some(error) => error.to_string(),
            None => format!("stat was '{}'", response.stat),
        };
        return Err(crate::StatusError::Upstream(detail));
    }

    Ok(response.monitors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_is_oldest_first_and_ends_at_last_day() {
        let window = DayWindow::ending_at(date(2026, 3, 10), 3);
        assert_eq!(
            window.days(),
            &[date(2026, 3, 8), date(2026, 3, 9), date(2026, 3, 10)]
        );
    }

    #[test]
    fn window_crosses_month_boundary() {
        let window = DayWindow::ending_at(date(2026, 3, 1), 2);
        assert_eq!(window.days(), &[date(2026, 2, 28), date(2026, 3, 1)]);
    }

    #[test]
    fn epochs_are_utc_midnights() {
        let window = DayWindow::ending_at(date(2026, 1, 2), 2);
        // 2026-01-01T00:00:00Z
        assert_eq!(window.start_epoch(), 1_767_225_600);
        // midnight after 2026-01-02
        assert_eq!(window.end_epoch(), 1_767_225_600 + 2 * 86_400);
    }

    #[test]
    fn uptime_ranges_has_one_pair_per_day_plus_aggregate() {
        let window = DayWindow::ending_at(date(2026, 1, 2), 2);
        let ranges = window.uptime_ranges();
        let pairs: Vec<&str> = ranges.split('-').collect();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0], "1767225600_1767312000");
        assert_eq!(pairs[1], "1767312000_1767398400");
        assert_eq!(pairs[2], "1767225600_1767398400");
    }

    #[test]
    fn index_maps_each_day_to_its_position() {
        let window = DayWindow::ending_at(date(2026, 3, 10), 3);
        let index = window.index();
        assert_eq!(index[&date(2026, 3, 8)], 0);
        assert_eq!(index[&date(2026, 3, 10)], 2);
        assert!(!index.contains_key(&date(2026, 3, 7)));
    }

    #[test]
    fn request_params_carry_token_window_and_ranges() {
        let window = DayWindow::ending_at(date(2026, 1, 2), 2);
        let params = monitor_request_params("u12345-secret", &window);

        let get = |name: &str| {
            params
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("api_key"), "u12345-secret");
        assert_eq!(get("format"), "json");
        assert_eq!(get("logs"), "1");
        assert_eq!(get("log_types"), "1-2");
        assert_eq!(get("logs_start_date"), "1767225600");
        assert_eq!(get("logs_end_date"), "1767398400");
        assert_eq!(get("custom_uptime_ranges"), window.uptime_ranges());
    }

    #[test]
    fn form_query_percent_encodes_values() {
        let params = vec![("a".to_string(), "x y&z".to_string())];
        assert_eq!(form_query(&params), "a=x+y%26z");
    }

    #[test]
    fn decode_valid_payload() {
        let body = r#"{
            "stat": "ok",
            "monitors": [{
                "id": 777,
                "friendly_name": "web-1",
                "url": "https://example.com",
                "status": 2,
                "custom_uptime_ranges": "100-100-100",
                "logs": [{"type": 1, "datetime": 1767225600, "duration": 60}]
            }]
        }"#;
        let monitors = decode_monitors(body).unwrap();
        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors[0].id, 777);
        assert_eq!(monitors[0].friendly_name, "web-1");
        assert_eq!(monitors[0].logs[0].log_type, 1);
    }

    #[test]
    fn decode_rejects_error_stat_with_upstream_detail() {
        let body = r#"{"stat":"fail","error":{"type":"invalid_parameter","message":"api_key is wrong"}}"#;
        let err = decode_monitors(body).unwrap_err();
        match err {
            crate::StatusError::Upstream(detail) => {
                assert!(detail.contains("api_key is wrong"), "{detail}");
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_missing_required_fields() {
        // monitor without custom_uptime_ranges
        let body = r#"{"stat":"ok","monitors":[{"id":1,"friendly_name":"m","status":2}]}"#;
        assert!(matches!(
            decode_monitors(body),
            Err(crate::StatusError::Upstream(_))
        ));
    }

    #[test]
    fn decode_rejects_non_json() {
        assert!(matches!(
            decode_monitors("<html>proxy error</html>"),
            Err(crate::StatusError::Upstream(_))
        ));
    }
}
