//! Network rate sampling
//!
//! Turns monotonically increasing byte counters into bytes-per-second rates.
//! Elapsed time is taken from the capture timestamps of the two snapshots,
//! never from the configured interval, except when the clock went backwards.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::error::{MonitorError, MonitorResult};

/// Cumulative counters of one interface as reported by the metrics source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub name: String,
    pub bytes_received: u64,
    pub bytes_sent: u64,
}

impl InterfaceCounters {
    pub fn new(name: impl ToString, bytes_received: u64, bytes_sent: u64) -> Self {
        Self {
            name: name.to_string(),
            bytes_received,
            bytes_sent,
        }
    }
}

/// Which interfaces feed the rate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceSelector {
    /// Bind to exactly one interface
    Named(String),

    /// Sum every interface that is neither loopback nor virtual
    Aggregate { excluded_prefixes: Vec<String> },
}

impl InterfaceSelector {
    /// Whether an interface takes part in the aggregate sum
    pub fn is_physical(name: &str, excluded_prefixes: &[String]) -> bool {
        let lower = name.to_lowercase();
        if lower == "lo" || lower == "lo0" {
            return false;
        }
        !excluded_prefixes
            .iter()
            .any(|prefix| lower.starts_with(&prefix.to_lowercase()))
    }

    /// Human readable description for start-up logs
    pub fn describe(&self, counters: &[InterfaceCounters]) -> String {
        match self {
            InterfaceSelector::Named(name) => format!("interface {name}"),
            InterfaceSelector::Aggregate { excluded_prefixes } => {
                let names: Vec<&str> = counters
                    .iter()
                    .filter(|c| Self::is_physical(&c.name, excluded_prefixes))
                    .map(|c| c.name.as_str())
                    .collect();
                if names.is_empty() {
                    "no physical interface found".to_string()
                } else {
                    format!("sum of physical interfaces: {}", names.join(", "))
                }
            }
        }
    }

    /// Pick the counters for this tick and the key they are stored under.
    ///
    /// Aggregate keys carry the participating interface names so a changed
    /// interface set is never compared against an old sum.
    fn select(&self, counters: &[InterfaceCounters]) -> MonitorResult<(String, u64, u64)> {
        match self {
            InterfaceSelector::Named(name) => counters
                .iter()
                .find(|c| &c.name == name)
                .map(|c| (c.name.clone(), c.bytes_received, c.bytes_sent))
                .ok_or_else(|| MonitorError::InterfaceNotFound(name.clone())),
            InterfaceSelector::Aggregate { excluded_prefixes } => {
                let mut used: Vec<&InterfaceCounters> = counters
                    .iter()
                    .filter(|c| Self::is_physical(&c.name, excluded_prefixes))
                    .collect();
                if used.is_empty() {
                    return Err(MonitorError::NoUsableInterface);
                }
                used.sort_by(|a, b| a.name.cmp(&b.name));

                let received = used.iter().map(|c| c.bytes_received).fold(0u64, u64::wrapping_add);
                let sent = used.iter().map(|c| c.bytes_sent).fold(0u64, u64::wrapping_add);
                let names: Vec<&str> = used.iter().map(|c| c.name.as_str()).collect();

                Ok((format!("total_{}", names.join("_")), received, sent))
            }
        }
    }
}

/// Counters captured at one instant under a selection key
#[derive(Debug, Clone, PartialEq)]
pub struct CounterSnapshot {
    pub key: String,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub captured_at: DateTime<Utc>,
}

/// Inbound and outbound throughput in bytes per second
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rate {
    pub in_bps: f64,
    pub out_bps: f64,
}

/// Converts consecutive counter observations into rates
#[derive(Debug)]
pub struct RateSampler {
    selector: InterfaceSelector,
    nominal_interval: Duration,
    last: Option<CounterSnapshot>,
}

impl RateSampler {
    pub fn new(selector: InterfaceSelector, nominal_interval: Duration) -> Self {
        Self {
            selector,
            nominal_interval,
            last: None,
        }
    }

    pub fn selector(&self) -> &InterfaceSelector {
        &self.selector
    }

    pub fn last_snapshot(&self) -> Option<&CounterSnapshot> {
        self.last.as_ref()
    }

    /// Switch interface selection. Any stored baseline is dropped when the
    /// selection actually changes.
    pub fn set_selector(&mut self, selector: InterfaceSelector) {
        if selector != self.selector {
            debug!("interface selection changed, dropping counter snapshot");
            self.selector = selector;
            self.last = None;
        }
    }

    pub fn set_nominal_interval(&mut self, interval: Duration) {
        self.nominal_interval = interval;
    }

    /// Compute the rate since the previous snapshot.
    ///
    /// The first snapshot under a key yields `0/0`. A counter that went
    /// backwards restarts the baseline and also yields `0/0`.
    #[instrument(skip(self, counters))]
    pub fn sample(
        &mut self,
        counters: &[InterfaceCounters],
        now: DateTime<Utc>,
    ) -> MonitorResult<Rate> {
        let (key, bytes_received, bytes_sent) = self.selector.select(counters)?;

        let current = CounterSnapshot {
            key,
            bytes_received,
            bytes_sent,
            captured_at: now,
        };

        let Some(previous) = self.last.replace(current.clone()) else {
            debug!("{}: first snapshot, no rate yet", current.key);
            return Ok(Rate::default());
        };

        if previous.key != current.key {
            debug!(
                "counter key changed ({} -> {}), restarting baseline",
                previous.key, current.key
            );
            return Ok(Rate::default());
        }

        if current.bytes_received < previous.bytes_received
            || current.bytes_sent < previous.bytes_sent
        {
            warn!(
                "{}: counters decreased (rx {} -> {}, tx {} -> {}), treating as reset",
                current.key,
                previous.bytes_received,
                current.bytes_received,
                previous.bytes_sent,
                current.bytes_sent
            );
            return Ok(Rate::default());
        }

        let mut elapsed = (current.captured_at - previous.captured_at).as_seconds_f64();
        if elapsed <= 0.0 {
            warn!(
                "{}: non-positive sampling interval ({elapsed}s), using nominal {:?}",
                current.key, self.nominal_interval
            );
            elapsed = self.nominal_interval.as_secs_f64();
        }
        if elapsed <= 0.0 {
            return Ok(Rate::default());
        }

        Ok(Rate {
            in_bps: (current.bytes_received - previous.bytes_received) as f64 / elapsed,
            out_bps: (current.bytes_sent - previous.bytes_sent) as f64 / elapsed,
        })
    }
}
