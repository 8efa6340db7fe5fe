//! Integration tests for the collector's HTTP surface
//!
//! These tests verify that:
//! - Accepted reports reach the registry and notifier
//! - Alerts raise once and recover once across real HTTP requests
//! - Rejected reports leave no trace
//! - The admin token guards status and test endpoints

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use fleetwatch::{
    ApiResponse,
    actors::notifier::NotificationHandle,
    alerts::NotificationKind,
    api::{ApiConfig, ApiState, spawn_api_server},
    monitors::resources::Metric,
    registry::{NodeRegistry, NodeStatus},
    transport::{HttpReportChannel, ReportChannel},
};
use reqwest::StatusCode;
use tokio::sync::oneshot;

use crate::helpers::*;

/// Enough throughput to stay above the 100 Mbps floor
const HEALTHY_BPS: f64 = 25_000_000.0;

struct TestCollector {
    addr: SocketAddr,
    registry: NodeRegistry,
    _shutdown: oneshot::Sender<()>,
}

impl TestCollector {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

async fn spawn_test_collector(
    admin_token: Option<&str>,
    recording: Option<&Arc<RecordingNotifier>>,
) -> TestCollector {
    let (notifications, _task) = NotificationHandle::spawn(recording.and_then(as_notifier));
    let registry = NodeRegistry::new(test_thresholds()).with_notifications(notifications.clone());
    let state = ApiState::new(registry.clone(), notifications, "secret");

    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(), // Random port
        admin_token: admin_token.map(str::to_string),
        enable_cors: true,
    };

    let (tx, rx) = oneshot::channel::<()>();
    let (addr, _server) = spawn_api_server(config, state, async move {
        let _ = rx.await;
    })
    .await
    .unwrap();

    TestCollector {
        addr,
        registry,
        _shutdown: tx,
    }
}

#[tokio::test]
async fn test_two_reports_build_history_without_alerts() {
    let recording = Arc::new(RecordingNotifier::default());
    let collector = spawn_test_collector(None, Some(&recording)).await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let response = client
            .post(collector.url("/api/report"))
            .json(&create_test_report(
                "secret",
                "h1",
                create_test_metrics(10.0, HEALTHY_BPS),
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let reply: ApiResponse = response.json().await.unwrap();
        assert!(reply.success);
        assert_eq!(reply.message, "report received");
    }

    let node = collector.registry.get("h1").await.unwrap();
    assert_eq!(node.report_samples, 2);
    assert!(node.is_online);
    assert!(!node.cpu_alerted);
    assert!(!node.bandwidth_alerted);
    assert!(!node.memory_alerted);

    assert_eq!(recording.wait_for(1).await, vec![NotificationKind::NodeOnline]);
}

#[tokio::test]
async fn test_cpu_alert_raises_and_recovers_once() {
    let recording = Arc::new(RecordingNotifier::default());
    let collector = spawn_test_collector(None, Some(&recording)).await;
    let channel = HttpReportChannel::new(std::time::Duration::from_secs(5)).unwrap();
    let server_url = format!("http://{}", collector.addr);

    for cpu in [10.0, 96.0, 96.0, 10.0] {
        let report = create_test_report("secret", "h1", create_test_metrics(cpu, HEALTHY_BPS));
        channel.send(&server_url, &report).await.unwrap();
    }

    let kinds = recording.wait_for(3).await;
    assert_eq!(
        kinds,
        vec![
            NotificationKind::NodeOnline,
            NotificationKind::AlertRaised(Metric::Cpu),
            NotificationKind::Recovered(Metric::Cpu),
        ]
    );
    assert!(!collector.registry.get("h1").await.unwrap().cpu_alerted);
}

#[tokio::test]
async fn test_wrong_secret_is_rejected() {
    let collector = spawn_test_collector(None, None).await;
    let channel = HttpReportChannel::new(std::time::Duration::from_secs(5)).unwrap();

    let report = create_test_report("wrong", "h1", create_test_metrics(10.0, HEALTHY_BPS));
    let result = channel
        .send(&format!("http://{}", collector.addr), &report)
        .await;

    assert!(result.is_err());
    assert!(collector.registry.is_empty().await);
}

#[tokio::test]
async fn test_empty_hostname_is_rejected() {
    let collector = spawn_test_collector(None, None).await;

    let response = reqwest::Client::new()
        .post(collector.url("/api/report"))
        .json(&create_test_report(
            "secret",
            "",
            create_test_metrics(10.0, HEALTHY_BPS),
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(collector.registry.is_empty().await);
}

#[tokio::test]
async fn test_concurrent_reports_from_many_hosts() {
    let recording = Arc::new(RecordingNotifier::default());
    let collector = spawn_test_collector(None, Some(&recording)).await;
    let client = reqwest::Client::new();

    let requests = (0..20).map(|i| {
        client
            .post(collector.url("/api/report"))
            .json(&create_test_report(
                "secret",
                &format!("node-{i:02}"),
                create_test_metrics(10.0, HEALTHY_BPS),
            ))
            .send()
    });

    for response in futures::future::join_all(requests).await {
        assert_eq!(response.unwrap().status(), StatusCode::OK);
    }

    assert_eq!(collector.registry.len().await, 20);
    let kinds = recording.wait_for(20).await;
    assert_eq!(kinds.len(), 20);
    assert!(kinds.iter().all(|kind| *kind == NotificationKind::NodeOnline));
}

#[tokio::test]
async fn test_status_sorted_by_hostname() {
    let collector = spawn_test_collector(Some("admin"), None).await;
    let client = reqwest::Client::new();

    for hostname in ["web-2", "db-1", "web-1"] {
        client
            .post(collector.url("/api/report"))
            .json(&create_test_report(
                "secret",
                hostname,
                create_test_metrics(10.0, HEALTHY_BPS),
            ))
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap();
    }

    let unauthorized = client
        .get(collector.url("/api/status"))
        .send()
        .await
        .unwrap();
    assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);

    let reply: ApiResponse<BTreeMap<String, NodeStatus>> = client
        .get(collector.url("/api/status"))
        .bearer_auth("admin")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(reply.success);
    let nodes = reply.data.unwrap();
    assert_eq!(
        nodes.keys().cloned().collect::<Vec<_>>(),
        vec!["db-1", "web-1", "web-2"]
    );
    assert!(nodes.values().all(|node| node.is_online));
}

#[tokio::test]
async fn test_status_export_matches_registry() {
    let collector = spawn_test_collector(None, None).await;
    let client = reqwest::Client::new();

    let mut metrics = create_test_metrics(17.0 / 7.0, HEALTHY_BPS + 1.0 / 3.0);
    metrics.network_out_bps = 1.0 / 101.0;
    client
        .post(collector.url("/api/report"))
        .json(&create_test_report("secret", "h1", metrics.clone()))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();

    let reply: ApiResponse<BTreeMap<String, NodeStatus>> = client
        .get(collector.url("/api/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let exported = reply.data.unwrap();
    assert_eq!(exported, collector.registry.snapshot_all().await);
    assert_eq!(exported["h1"].reading.metrics, metrics);
}

#[tokio::test]
async fn test_test_notification_reaches_notifier() {
    let recording = Arc::new(RecordingNotifier::default());
    let collector = spawn_test_collector(None, Some(&recording)).await;

    let response = reqwest::Client::new()
        .post(collector.url("/api/test-notification"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(recording.kinds(), vec![NotificationKind::Test]);
}

#[tokio::test]
async fn test_test_notification_without_notifier_is_rejected() {
    let collector = spawn_test_collector(None, None).await;

    let response = reqwest::Client::new()
        .post(collector.url("/api/test-notification"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_check() {
    let collector = spawn_test_collector(Some("admin"), None).await;

    let response = reqwest::get(collector.url("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
