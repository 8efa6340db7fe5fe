//! Time-windowed bandwidth threshold resolution

use std::sync::LazyLock;

use chrono::{NaiveTime, Timelike};
use regex::Regex;

use crate::config::{ThresholdConfig, TimeWindow};

static HH_MM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{2}):([0-9]{2})$").expect("valid HH:MM pattern")
});

/// Minutes since midnight for a strict `HH:MM` string
pub fn parse_hhmm(value: &str) -> Option<u32> {
    let captures = HH_MM.captures(value)?;
    let hour: u32 = captures[1].parse().ok()?;
    let minute: u32 = captures[2].parse().ok()?;
    (hour < 24 && minute < 60).then_some(hour * 60 + minute)
}

impl TimeWindow {
    /// Whether `now` lies in `[start, end)`, wrapping past midnight when
    /// `start > end`. Malformed bounds never match.
    pub fn contains(&self, now: NaiveTime) -> bool {
        let (Some(start), Some(end)) = (parse_hhmm(&self.start), parse_hhmm(&self.end)) else {
            return false;
        };
        let minutes = now.hour() * 60 + now.minute();

        if start <= end {
            minutes >= start && minutes < end
        } else {
            minutes >= start || minutes < end
        }
    }
}

/// The single bandwidth floor in effect at `now`.
///
/// The first matching window with a positive limit wins, then the static
/// limit if positive. `0` means no limit is configured.
pub fn effective_threshold_mbps(now: NaiveTime, config: &ThresholdConfig) -> f64 {
    config
        .dynamic
        .iter()
        .find(|window| window.bandwidth_mbps > 0.0 && window.contains(now))
        .map(|window| window.bandwidth_mbps)
        .or_else(|| (config.static_bandwidth_mbps > 0.0).then_some(config.static_bandwidth_mbps))
        .unwrap_or(0.0)
}
