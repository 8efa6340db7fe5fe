use serde::{Deserialize, Serialize};

use crate::{SystemMetrics, config::Thresholds};

/// Metrics the collector raises alerts for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Bandwidth,
    Cpu,
    Memory,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Bandwidth, Metric::Cpu, Metric::Memory];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Bandwidth => "Bandwidth",
            Metric::Cpu => "CPU",
            Metric::Memory => "Memory",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Bandwidth => " Mbps",
            Metric::Cpu | Metric::Memory => "%",
        }
    }

    /// Bandwidth is a floor (alert when traffic drops below it), CPU and
    /// memory are ceilings.
    pub fn violates(&self, value: f64, threshold: f64) -> bool {
        match self {
            Metric::Bandwidth => value < threshold,
            Metric::Cpu | Metric::Memory => value > threshold,
        }
    }
}

/// One metric's current value against its resolved threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceCheck {
    pub metric: Metric,
    pub value: f64,
    pub threshold: f64,
}

impl ResourceCheck {
    pub fn is_violating(&self) -> bool {
        self.metric.violates(self.value, self.threshold)
    }
}

/// Resolve the checks that apply to a reading.
///
/// The bandwidth floor is the host's last reported threshold, falling back to
/// the collector-global one. A metric whose threshold is not positive is
/// disabled, as is memory when the total is unknown.
pub fn resource_checks(
    metrics: &SystemMetrics,
    host_threshold_mbps: f64,
    thresholds: &Thresholds,
) -> Vec<ResourceCheck> {
    let mut checks = Vec::with_capacity(3);

    let bandwidth_threshold = if host_threshold_mbps > 0.0 {
        host_threshold_mbps
    } else {
        thresholds.bandwidth_mbps
    };
    if bandwidth_threshold > 0.0 {
        checks.push(ResourceCheck {
            metric: Metric::Bandwidth,
            value: metrics.bandwidth_mbps(),
            threshold: bandwidth_threshold,
        });
    }

    if thresholds.cpu_percent > 0.0 {
        checks.push(ResourceCheck {
            metric: Metric::Cpu,
            value: metrics.cpu_percent,
            threshold: thresholds.cpu_percent,
        });
    }

    if thresholds.memory_percent > 0.0
        && let Some(memory) = metrics.memory_percent()
    {
        checks.push(ResourceCheck {
            metric: Metric::Memory,
            value: memory,
            threshold: thresholds.memory_percent,
        });
    }

    checks
}

/// Edge-triggered evaluation of one metric.
///
/// ```text
/// not alerting, not violating → Normal
/// not alerting, violating     → StartsToViolate (raise)
/// alerting,     violating     → Violating
/// alerting,     not violating → BackToNormal (recover)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceEvaluation {
    Normal,
    Violating,
    StartsToViolate,
    BackToNormal,
}

impl ResourceEvaluation {
    pub fn evaluate(violating: bool, alerted: bool) -> ResourceEvaluation {
        match (alerted, violating) {
            (false, false) => ResourceEvaluation::Normal,
            (false, true) => ResourceEvaluation::StartsToViolate,
            (true, true) => ResourceEvaluation::Violating,
            (true, false) => ResourceEvaluation::BackToNormal,
        }
    }

    /// Alert flag after this evaluation
    pub fn alerted(&self) -> bool {
        matches!(
            self,
            ResourceEvaluation::Violating | ResourceEvaluation::StartsToViolate
        )
    }

    /// Whether this evaluation changes state and must be announced
    pub fn is_transition(&self) -> bool {
        matches!(
            self,
            ResourceEvaluation::StartsToViolate | ResourceEvaluation::BackToNormal
        )
    }
}
