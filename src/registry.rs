//! Node registry - authoritative host status on the collector
//!
//! One lock-guarded map from hostname to [`NodeStatus`]. Report ingestion and
//! the liveness sweep take the write lock; the status export takes the read
//! lock. Every operation is a single critical section and returns the
//! resulting [`NodeEvent`]s. With a [`NotificationHandle`] attached, the
//! events are also queued before the write lock is released, so the
//! notification order of a host always matches its state transitions.
//! Queueing never blocks; delivery happens on the notification actor.

use std::collections::{BTreeMap, HashMap, hash_map::Entry};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, trace};

use crate::{
    Reading,
    actors::{messages::NodeEvent, notifier::NotificationHandle},
    config::Thresholds,
    monitors::resources::{Metric, ResourceEvaluation, resource_checks},
};

/// Reports needed before alerts are evaluated; the first bandwidth rate of
/// a host is always zero.
pub const MIN_SAMPLES_FOR_ALERTS: u64 = 2;

/// Current status of one host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub hostname: String,
    pub last_seen: DateTime<Utc>,
    pub reading: Reading,
    pub is_online: bool,
    pub bandwidth_alerted: bool,
    pub cpu_alerted: bool,
    pub memory_alerted: bool,
    /// Accepted reports since the host was first seen
    pub report_samples: u64,
    /// Last positive bandwidth floor reported by the host
    pub last_threshold_mbps: f64,
}

impl NodeStatus {
    fn new(hostname: &str, reading: Reading, now: DateTime<Utc>) -> Self {
        Self {
            hostname: hostname.to_string(),
            last_seen: now,
            last_threshold_mbps: reading.effective_threshold_mbps.unwrap_or(0.0),
            reading,
            is_online: true,
            bandwidth_alerted: false,
            cpu_alerted: false,
            memory_alerted: false,
            report_samples: 0,
        }
    }

    pub fn is_alerted(&self, metric: Metric) -> bool {
        match metric {
            Metric::Bandwidth => self.bandwidth_alerted,
            Metric::Cpu => self.cpu_alerted,
            Metric::Memory => self.memory_alerted,
        }
    }

    fn alert_flag_mut(&mut self, metric: Metric) -> &mut bool {
        match metric {
            Metric::Bandwidth => &mut self.bandwidth_alerted,
            Metric::Cpu => &mut self.cpu_alerted,
            Metric::Memory => &mut self.memory_alerted,
        }
    }

    fn clear_alerts(&mut self) {
        self.bandwidth_alerted = false;
        self.cpu_alerted = false;
        self.memory_alerted = false;
    }

    /// Run the alert state machine of every enabled metric against the
    /// stored reading.
    fn evaluate_alerts(&mut self, thresholds: &Thresholds, now: DateTime<Utc>) -> Vec<NodeEvent> {
        let checks = resource_checks(&self.reading.metrics, self.last_threshold_mbps, thresholds);
        let mut events = vec![];

        // a metric without a check can neither violate nor recover
        for metric in Metric::ALL {
            if self.is_alerted(metric) && !checks.iter().any(|check| check.metric == metric) {
                debug!("{}: {} no longer checked, clearing alert", self.hostname, metric.label());
                *self.alert_flag_mut(metric) = false;
            }
        }

        for check in checks {
            let flag = self.alert_flag_mut(check.metric);
            let evaluation = ResourceEvaluation::evaluate(check.is_violating(), *flag);
            *flag = evaluation.alerted();

            trace!(
                "{}: {} {:.2} vs {:.2} -> {evaluation:?}",
                self.hostname,
                check.metric.label(),
                check.value,
                check.threshold
            );

            match evaluation {
                ResourceEvaluation::StartsToViolate => {
                    info!(
                        "{}: {} alert ({:.2}{unit}, threshold {:.2}{unit})",
                        self.hostname,
                        check.metric.label(),
                        check.value,
                        check.threshold,
                        unit = check.metric.unit()
                    );
                    events.push(NodeEvent::AlertRaised {
                        hostname: self.hostname.clone(),
                        metric: check.metric,
                        value: check.value,
                        threshold: check.threshold,
                        at: now,
                    });
                }
                ResourceEvaluation::BackToNormal => {
                    info!(
                        "{}: {} recovered ({:.2}{unit})",
                        self.hostname,
                        check.metric.label(),
                        check.value,
                        unit = check.metric.unit()
                    );
                    events.push(NodeEvent::Recovered {
                        hostname: self.hostname.clone(),
                        metric: check.metric,
                        value: check.value,
                        threshold: check.threshold,
                        at: now,
                    });
                }
                ResourceEvaluation::Normal | ResourceEvaluation::Violating => {}
            }
        }

        events
    }
}

/// Result of ingesting one report
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    pub is_new: bool,
    pub was_offline: bool,
    /// Online notification first, then alert transitions
    pub events: Vec<NodeEvent>,
}

/// Shared, lock-guarded registry of all hosts that ever reported
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    nodes: Arc<RwLock<HashMap<String, NodeStatus>>>,
    thresholds: Arc<Thresholds>,
    notifications: Option<NotificationHandle>,
}

impl NodeRegistry {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            nodes: Arc::new(RwLock::new(HashMap::new())),
            thresholds: Arc::new(thresholds),
            notifications: None,
        }
    }

    /// Queue every produced event to `notifications` under the write lock
    pub fn with_notifications(mut self, notifications: NotificationHandle) -> Self {
        self.notifications = Some(notifications);
        self
    }

    fn publish(&self, events: &[NodeEvent]) {
        if let Some(notifications) = &self.notifications {
            notifications.deliver_all(events.iter().cloned());
        }
    }

    pub async fn upsert(&self, hostname: &str, reading: Reading) -> UpsertOutcome {
        self.upsert_at(hostname, reading, Utc::now()).await
    }

    /// Record an accepted report and evaluate alerts.
    ///
    /// Alerts are only evaluated once the host has at least
    /// [`MIN_SAMPLES_FOR_ALERTS`] reports, and never on the report that
    /// brings an offline host back.
    #[instrument(skip(self, reading))]
    pub async fn upsert_at(
        &self,
        hostname: &str,
        reading: Reading,
        now: DateTime<Utc>,
    ) -> UpsertOutcome {
        let reported_threshold = reading.effective_threshold_mbps.unwrap_or(0.0);

        let mut nodes = self.nodes.write().await;

        let (node, is_new, was_offline) = match nodes.entry(hostname.to_string()) {
            Entry::Occupied(entry) => {
                let node = entry.into_mut();
                let was_offline = !node.is_online;
                node.reading = reading;
                if reported_threshold > 0.0 {
                    node.last_threshold_mbps = reported_threshold;
                }
                (node, false, was_offline)
            }
            Entry::Vacant(entry) => {
                info!("new node online: {hostname}");
                (entry.insert(NodeStatus::new(hostname, reading, now)), true, false)
            }
        };

        node.last_seen = now;
        node.is_online = true;
        node.report_samples += 1;

        let mut events = vec![];
        if is_new || was_offline {
            if was_offline {
                info!("node back online: {hostname}");
            }
            events.push(NodeEvent::Online {
                hostname: hostname.to_string(),
                first_seen: is_new,
                at: now,
            });
        }

        if was_offline {
            debug!("{hostname}: skipping alert evaluation on reconnect");
        } else if node.report_samples >= MIN_SAMPLES_FOR_ALERTS {
            events.extend(node.evaluate_alerts(&self.thresholds, now));
        } else {
            trace!(
                "{hostname}: cold start, {}/{MIN_SAMPLES_FOR_ALERTS} samples",
                node.report_samples
            );
        }

        self.publish(&events);
        drop(nodes);

        UpsertOutcome {
            is_new,
            was_offline,
            events,
        }
    }

    pub async fn sweep(&self) -> Vec<NodeEvent> {
        self.sweep_at(Utc::now()).await
    }

    /// Mark every online node silent for longer than the offline timeout as
    /// offline and clear its alert flags.
    #[instrument(skip(self))]
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Vec<NodeEvent> {
        let timeout = self.thresholds.offline_timeout();
        let limit = TimeDelta::from_std(timeout).unwrap_or(TimeDelta::MAX);

        let mut nodes = self.nodes.write().await;
        let mut events = vec![];

        for node in nodes.values_mut() {
            let silence = now - node.last_seen;
            if !node.is_online || silence <= limit {
                continue;
            }

            node.is_online = false;
            node.clear_alerts();

            info!(
                "node {} offline, last report at {}",
                node.hostname,
                node.last_seen.format("%Y-%m-%d %H:%M:%S")
            );

            events.push(NodeEvent::Offline {
                hostname: node.hostname.clone(),
                silent_for: silence.to_std().unwrap_or(Duration::ZERO),
                last_seen: node.last_seen,
                at: now,
            });
        }

        self.publish(&events);
        events
    }

    /// Read-only copy of all node statuses, ordered by hostname
    pub async fn snapshot_all(&self) -> BTreeMap<String, NodeStatus> {
        let nodes = self.nodes.read().await;
        nodes
            .iter()
            .map(|(hostname, status)| (hostname.clone(), status.clone()))
            .collect()
    }

    pub async fn get(&self, hostname: &str) -> Option<NodeStatus> {
        self.nodes.read().await.get(hostname).cloned()
    }

    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }
}
