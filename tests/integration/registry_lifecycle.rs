//! Integration tests for node lifecycle across registry, sweeper and notifier
//!
//! These tests verify that:
//! - Offline and back-online transitions are notified exactly once
//! - Alert flags do not survive an offline period
//! - A host's own bandwidth floor overrides the collector default

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use fleetwatch::{
    Reading, SystemMetrics,
    actors::{messages::NodeEvent, notifier::NotificationHandle, sweeper::SweeperHandle},
    alerts::NotificationKind,
    monitors::resources::Metric,
    registry::NodeRegistry,
};
use assert_matches::assert_matches;

use crate::helpers::*;

fn t(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap() + TimeDelta::seconds(seconds)
}

fn reading(metrics: SystemMetrics, threshold_mbps: Option<f64>, at: DateTime<Utc>) -> Reading {
    Reading {
        metrics,
        captured_at: at,
        effective_threshold_mbps: threshold_mbps,
    }
}

#[tokio::test]
async fn test_offline_node_comes_back_without_stale_alerts() {
    let registry = NodeRegistry::new(test_thresholds());
    let busy = create_test_metrics(99.0, 25_000_000.0);

    registry.upsert_at("h1", reading(busy.clone(), None, t(0)), t(0)).await;
    let outcome = registry
        .upsert_at("h1", reading(busy.clone(), None, t(60)), t(60))
        .await;
    assert_matches!(
        outcome.events.as_slice(),
        [NodeEvent::AlertRaised { metric: Metric::Cpu, .. }]
    );

    let events = registry.sweep_at(t(60 + 301)).await;
    assert_matches!(events.as_slice(), [NodeEvent::Offline { silent_for, .. }] if *silent_for == Duration::from_secs(301));

    let node = registry.get("h1").await.unwrap();
    assert!(!node.is_online);
    assert!(!node.cpu_alerted);

    // still busy when it comes back: only the reconnect is reported
    let outcome = registry
        .upsert_at("h1", reading(busy.clone(), None, t(1000)), t(1000))
        .await;
    assert!(outcome.was_offline);
    assert_matches!(
        outcome.events.as_slice(),
        [NodeEvent::Online { first_seen: false, .. }]
    );

    // next report evaluates again and raises anew
    let outcome = registry
        .upsert_at("h1", reading(busy, None, t(1060)), t(1060))
        .await;
    assert_matches!(
        outcome.events.as_slice(),
        [NodeEvent::AlertRaised { metric: Metric::Cpu, .. }]
    );
    assert_eq!(registry.get("h1").await.unwrap().report_samples, 4);
}

#[tokio::test]
async fn test_host_threshold_overrides_default_floor() {
    let registry = NodeRegistry::new(test_thresholds());
    // 40 Mbps is below the 100 Mbps default but above the host's own 20
    let metrics = create_test_metrics(10.0, 5_000_000.0);

    registry
        .upsert_at("h1", reading(metrics.clone(), Some(20.0), t(0)), t(0))
        .await;
    let outcome = registry
        .upsert_at("h1", reading(metrics.clone(), Some(20.0), t(60)), t(60))
        .await;
    assert!(outcome.events.is_empty());

    // a report without a threshold keeps the last one
    let outcome = registry
        .upsert_at("h1", reading(metrics, None, t(120)), t(120))
        .await;
    assert!(outcome.events.is_empty());
    assert_eq!(registry.get("h1").await.unwrap().last_threshold_mbps, 20.0);

    let slow = create_test_metrics(10.0, 1_250_000.0);
    let outcome = registry
        .upsert_at("h1", reading(slow, None, t(180)), t(180))
        .await;
    assert_matches!(
        outcome.events.as_slice(),
        [NodeEvent::AlertRaised { metric: Metric::Bandwidth, value, threshold, .. }]
            if *value == 10.0 && *threshold == 20.0
    );
}

#[tokio::test]
async fn test_unknown_memory_total_skips_memory_check() {
    let registry = NodeRegistry::new(test_thresholds());
    let metrics = SystemMetrics {
        memory_used: 1_000,
        memory_total: 0,
        ..create_test_metrics(10.0, 25_000_000.0)
    };

    registry
        .upsert_at("h1", reading(metrics.clone(), None, t(0)), t(0))
        .await;
    let outcome = registry
        .upsert_at("h1", reading(metrics, None, t(60)), t(60))
        .await;

    assert!(outcome.events.is_empty());
    assert!(!registry.get("h1").await.unwrap().memory_alerted);
}

#[tokio::test]
async fn test_sweeper_notifies_offline_once() {
    let recording = Arc::new(RecordingNotifier::default());
    let (notifications, _task) = NotificationHandle::spawn(as_notifier(&recording));
    let registry = NodeRegistry::new(test_thresholds()).with_notifications(notifications.clone());

    // last seen long ago
    let long_ago = Utc::now() - TimeDelta::seconds(600);
    registry
        .upsert_at(
            "h1",
            reading(create_test_metrics(10.0, 25_000_000.0), None, long_ago),
            long_ago,
        )
        .await;

    let sweeper = SweeperHandle::spawn(registry.clone(), Duration::from_secs(3600));

    let events = sweeper.sweep_now().await.unwrap();
    assert_eq!(events.len(), 1);
    assert!(sweeper.sweep_now().await.unwrap().is_empty());

    assert_eq!(
        recording.wait_for(2).await,
        vec![NotificationKind::NodeOnline, NotificationKind::NodeOffline]
    );
    assert!(!registry.get("h1").await.unwrap().is_online);

    sweeper.shutdown().await.unwrap();
    notifications.shutdown().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_sweep_and_report_keep_notification_order() {
    for _ in 0..50 {
        let recording = Arc::new(RecordingNotifier::default());
        let (notifications, _task) = NotificationHandle::spawn(as_notifier(&recording));
        let registry = NodeRegistry::new(test_thresholds());

        let long_ago = Utc::now() - TimeDelta::seconds(600);
        registry
            .upsert_at(
                "h1",
                reading(create_test_metrics(10.0, 25_000_000.0), None, long_ago),
                long_ago,
            )
            .await;
        let registry = registry.with_notifications(notifications.clone());

        let sweep = tokio::spawn({
            let registry = registry.clone();
            async move { registry.sweep().await }
        });
        let report = tokio::spawn({
            let registry = registry.clone();
            async move {
                registry
                    .upsert("h1", reading(create_test_metrics(10.0, 25_000_000.0), None, Utc::now()))
                    .await
            }
        });

        let swept = sweep.await.unwrap();
        report.await.unwrap();

        // either the report won and nothing changed, or the node went
        // offline and came back, in that order
        if swept.is_empty() {
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(recording.kinds().is_empty());
        } else {
            assert_eq!(
                recording.wait_for(2).await,
                vec![NotificationKind::NodeOffline, NotificationKind::NodeBackOnline]
            );
        }
        assert!(registry.get("h1").await.unwrap().is_online);

        notifications.shutdown().unwrap();
    }
}
