//! Normalizer: raw upstream monitors into per-day availability records
//!
//! Pure and deterministic: the same payload and window always produce the
//! same record.

use crate::api::{DayWindow, RawMonitor};
use crate::monitor::{DayStat, MonitorRecord, MonitorStatus, Outage};

/// Upstream log type code for an outage entry
const OUTAGE_LOG_TYPE: i64 = 1;

/// Normalize one upstream monitor over the requested day window.
///
/// The dash-joined uptime ranges carry one value per requested day plus a
/// trailing whole-window aggregate; the aggregate is popped into `average`
/// and the rest become one `DayStat` per day. Outage logs are bucketed by
/// the UTC calendar day of their start timestamp into that day's tally and
/// the window total; logs outside the window are dropped.
pub fn normalize_monitor(raw: &RawMonitor, window: &DayWindow) -> crate::Result<MonitorRecord> {
    let mut ranges: Vec<&str> = raw.custom_uptime_ranges.split('-').collect();

    let average = match ranges.pop() {
        Some(aggregate) => parse_uptime(aggregate)?,
        None => {
            return Err(crate::StatusError::Upstream(format!(
                "Monitor {} has no uptime ranges",
                raw.id
            )))
        }
    };

    if ranges.len() < window.len() {
        return Err(crate::StatusError::Upstream(format!(
            "Monitor {} has {} uptime ranges for a {} day window",
            raw.id,
            ranges.len(),
            window.len()
        )));
    }

    let mut daily: Vec<DayStat> = Vec::with_capacity(window.len());
    for (i, date) in window.days().iter().enumerate() {
        daily.push(DayStat {
            date: *date,
            uptime: parse_uptime(ranges[i])?,
            down: Outage::default(),
        });
    }

    let index = window.index();
    let mut total = Outage::default();
    for log in &raw.logs {
        if log.log_type != OUTAGE_LOG_TYPE {
            continue;
        }
        let Some(day) = DayWindow::day_of_epoch(log.datetime) else {
            continue;
        };
        let Some(&i) = index.get(&day) else {
            // out-of-window log, dropped
            continue;
        };
        daily[i].down.times += 1;
        daily[i].down.duration += log.duration;
        total.times += 1;
        total.duration += log.duration;
    }

    Ok(MonitorRecord {
        id: raw.id,
        name: raw.friendly_name.clone(),
        url: raw.url.clone(),
        average,
        daily,
        total,
        status: MonitorStatus::from_code(raw.status),
    })
}

fn parse_uptime(raw: &str) -> crate::Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map(round2)
        .map_err(|_| crate::StatusError::Upstream(format!("Invalid uptime value '{}'", raw)))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
