//! Message types for actor communication
//!
//! ## Design Principles
//!
//! 1. **Events**: state transitions produced by the node registry, consumed by
//!    the notification actor after the registry lock is released
//! 2. **Commands**: request/response messages sent to specific actors via mpsc
//! 3. **Immutability**: events are cloneable and carry everything needed to
//!    render a notification

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::{Reading, error::MonitorResult, monitors::resources::Metric};

/// A notable state transition of one host
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// First report of a new host, or first report after an offline period
    Online {
        hostname: String,
        first_seen: bool,
        at: DateTime<Utc>,
    },

    /// The liveness sweep found the host silent for longer than the timeout
    Offline {
        hostname: String,
        silent_for: Duration,
        last_seen: DateTime<Utc>,
        at: DateTime<Utc>,
    },

    /// A metric crossed its threshold (Normal → Alerting)
    AlertRaised {
        hostname: String,
        metric: Metric,
        value: f64,
        threshold: f64,
        at: DateTime<Utc>,
    },

    /// A metric returned within its threshold (Alerting → Normal)
    Recovered {
        hostname: String,
        metric: Metric,
        value: f64,
        threshold: f64,
        at: DateTime<Utc>,
    },
}

impl NodeEvent {
    pub fn hostname(&self) -> &str {
        match self {
            NodeEvent::Online { hostname, .. }
            | NodeEvent::Offline { hostname, .. }
            | NodeEvent::AlertRaised { hostname, .. }
            | NodeEvent::Recovered { hostname, .. } => hostname,
        }
    }
}

/// Commands that can be sent to the NotificationActor
#[derive(Debug)]
pub enum NotificationCommand {
    /// Render and deliver a node event
    Deliver(NodeEvent),

    /// Send the fixed connectivity-test message
    SendTest {
        respond_to: oneshot::Sender<MonitorResult<()>>,
    },

    /// Finish the in-flight delivery and stop
    Shutdown,
}

/// Commands that can be sent to the LivenessSweeper
#[derive(Debug)]
pub enum SweeperCommand {
    /// Sweep immediately, bypassing the timer
    SweepNow {
        respond_to: oneshot::Sender<Vec<NodeEvent>>,
    },

    Shutdown,
}

/// Commands that can be sent to the ReporterActor
#[derive(Debug)]
pub enum ReporterCommand {
    /// Collect and send a report immediately
    ReportNow {
        respond_to: oneshot::Sender<MonitorResult<Reading>>,
    },

    /// Stop after the in-flight report
    Shutdown,
}
