//! Host metrics sources
//!
//! The agent reads CPU, memory, uptime and per-interface byte counters
//! through [`MetricsSource`], so the report pipeline can run against a fixed
//! source in tests.

use sysinfo::{MemoryRefreshKind, Networks, System};
use tracing::trace;

use crate::{
    error::{MonitorError, MonitorResult},
    monitors::rate::InterfaceCounters,
};

/// Used and total memory in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    pub used: u64,
    pub total: u64,
}

/// Point-in-time access to host metrics. Every call may fail on its own.
pub trait MetricsSource: Send {
    fn cpu_percent(&mut self) -> MonitorResult<f64>;

    fn memory(&mut self) -> MonitorResult<MemoryUsage>;

    fn uptime_seconds(&mut self) -> MonitorResult<u64>;

    /// Cumulative counters of every interface currently present
    fn interface_counters(&mut self) -> MonitorResult<Vec<InterfaceCounters>>;
}

/// [`MetricsSource`] backed by `sysinfo`
///
/// CPU usage is measured between consecutive calls, so the first reading
/// after start-up covers the time since construction.
pub struct SysinfoSource {
    system: System,
    networks: Networks,
}

impl SysinfoSource {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();

        Self {
            system,
            networks: Networks::new_with_refreshed_list(),
        }
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSource for SysinfoSource {
    fn cpu_percent(&mut self) -> MonitorResult<f64> {
        self.system.refresh_cpu_usage();
        if self.system.cpus().is_empty() {
            return Err(MonitorError::MetricsUnavailable(
                "no CPU information".to_string(),
            ));
        }

        let usage = self.system.global_cpu_usage() as f64;
        trace!("cpu usage {usage:.2}%");
        Ok(usage)
    }

    fn memory(&mut self) -> MonitorResult<MemoryUsage> {
        self.system
            .refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());

        Ok(MemoryUsage {
            used: self.system.used_memory(),
            total: self.system.total_memory(),
        })
    }

    fn uptime_seconds(&mut self) -> MonitorResult<u64> {
        Ok(System::uptime())
    }

    fn interface_counters(&mut self) -> MonitorResult<Vec<InterfaceCounters>> {
        self.networks.refresh(true);

        let mut counters = self
            .networks
            .list()
            .iter()
            .map(|(name, data)| {
                InterfaceCounters::new(name, data.total_received(), data.total_transmitted())
            })
            .collect::<Vec<_>>();
        counters.sort_by(|a, b| a.name.cmp(&b.name));

        if counters.is_empty() {
            return Err(MonitorError::MetricsUnavailable(
                "no network interfaces listed".to_string(),
            ));
        }

        Ok(counters)
    }
}
