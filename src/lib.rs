pub mod actors;
pub mod alerts;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod discord;
pub mod error;
pub mod monitors;
pub mod registry;
pub mod source;
pub mod telegram;
pub mod transport;
pub mod util;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bytes per second in one megabit per second.
pub const BYTES_PER_MEGABIT: f64 = 125_000.0;

/// One point-in-time measurement bundle as produced by an agent.
///
/// CPU is reported as measured (it may transiently exceed 100) and memory
/// `used <= total` is not guaranteed by every source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub cpu_percent: f64,
    pub memory_used: u64,
    pub memory_total: u64,
    pub network_in_bps: f64,
    pub network_out_bps: f64,
    pub uptime_seconds: u64,
}

impl SystemMetrics {
    /// Larger of inbound and outbound throughput, in Mbps.
    pub fn bandwidth_mbps(&self) -> f64 {
        let in_mbps = self.network_in_bps / BYTES_PER_MEGABIT;
        let out_mbps = self.network_out_bps / BYTES_PER_MEGABIT;
        in_mbps.max(out_mbps)
    }

    /// Memory utilisation in percent, `None` when the total is unknown.
    pub fn memory_percent(&self) -> Option<f64> {
        if self.memory_total == 0 {
            return None;
        }
        Some(self.memory_used as f64 / self.memory_total as f64 * 100.0)
    }
}

/// A reading as accepted by the collector: the metrics plus their capture time
/// and the bandwidth floor the agent resolved for that instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub metrics: SystemMetrics,
    pub captured_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_threshold_mbps: Option<f64>,
}

/// Report body sent from agent to collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRequest {
    pub password: String,
    pub hostname: String,
    /// Capture time, unix seconds.
    pub timestamp: i64,
    pub metrics: SystemMetrics,
    /// `0` means the agent has no limit configured.
    #[serde(default)]
    pub effective_threshold_mbps: f64,
}

impl ReportRequest {
    pub fn reading(&self) -> Reading {
        Reading {
            metrics: self.metrics.clone(),
            captured_at: DateTime::from_timestamp(self.timestamp, 0).unwrap_or_else(Utc::now),
            effective_threshold_mbps: (self.effective_threshold_mbps > 0.0)
                .then_some(self.effective_threshold_mbps),
        }
    }
}

/// Uniform response envelope of the collector API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T = serde_json::Value> {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl ToString, data: Option<T>) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            data,
        }
    }

    pub fn failed(message: impl ToString) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            data: None,
        }
    }
}
