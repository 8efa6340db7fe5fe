//! Integration tests for the agent's report pipeline
//!
//! These tests verify that:
//! - The reporter sends a report immediately at start-up
//! - Reports carry the configured secret, hostname and bandwidth floor
//! - A rejected report surfaces as an error without stopping the reporter

use std::sync::Arc;
use std::time::Duration;

use fleetwatch::{
    ReportRequest,
    actors::reporter::ReporterHandle,
    config::{AgentConfig, ThresholdConfig},
    error::MonitorResult,
    monitors::rate::InterfaceCounters,
    source::{MemoryUsage, MetricsSource},
    transport::HttpReportChannel,
};
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Source whose eth0 counters grow by one megabyte per call
struct GrowingSource {
    bytes: u64,
}

impl MetricsSource for GrowingSource {
    fn cpu_percent(&mut self) -> MonitorResult<f64> {
        Ok(42.0)
    }

    fn memory(&mut self) -> MonitorResult<MemoryUsage> {
        Ok(MemoryUsage {
            used: 4_000_000_000,
            total: 16_000_000_000,
        })
    }

    fn uptime_seconds(&mut self) -> MonitorResult<u64> {
        Ok(7200)
    }

    fn interface_counters(&mut self) -> MonitorResult<Vec<InterfaceCounters>> {
        self.bytes += 1_000_000;
        Ok(vec![
            InterfaceCounters::new("lo", 10, 10),
            InterfaceCounters::new("eth0", self.bytes, self.bytes),
        ])
    }
}

fn agent_config(server_url: String) -> AgentConfig {
    let mut config = AgentConfig::template();
    config.password = "secret".to_string();
    config.server_url = server_url;
    config.hostname = "agent-1".to_string();
    config.report_interval_seconds = 3600;
    config.threshold = ThresholdConfig {
        static_bandwidth_mbps: 50.0,
        dynamic: vec![],
    };
    config
}

fn spawn_reporter(server_url: String) -> (ReporterHandle, watch::Sender<AgentConfig>) {
    let config = agent_config(server_url);
    let channel = HttpReportChannel::new(config.request_timeout()).unwrap();
    let (config_tx, config_rx) = watch::channel(config);

    let handle = ReporterHandle::spawn(
        Box::new(GrowingSource { bytes: 0 }),
        Arc::new(channel),
        config_rx,
    );
    (handle, config_tx)
}

async fn received_reports(server: &MockServer) -> Vec<ReportRequest> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect()
}

async fn wait_for_reports(server: &MockServer, count: usize) -> Vec<ReportRequest> {
    for _ in 0..100 {
        let reports = received_reports(server).await;
        if reports.len() >= count {
            return reports;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    received_reports(server).await
}

#[tokio::test]
async fn test_reports_reach_collector() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/report"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "message": "report received"
        })))
        .mount(&mock_server)
        .await;

    let (reporter, _config_tx) = spawn_reporter(mock_server.uri());

    // start-up report
    let reports = wait_for_reports(&mock_server, 1).await;
    assert_eq!(reports.len(), 1);
    let first = &reports[0];
    assert_eq!(first.password, "secret");
    assert_eq!(first.hostname, "agent-1");
    assert_eq!(first.effective_threshold_mbps, 50.0);
    assert_eq!(first.metrics.cpu_percent, 42.0);
    assert_eq!(first.metrics.network_in_bps, 0.0);
    assert_eq!(first.metrics.network_out_bps, 0.0);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let reading = reporter.report_now().await.unwrap();
    assert!(reading.metrics.network_in_bps > 0.0);
    assert_eq!(reading.effective_threshold_mbps, Some(50.0));

    let reports = wait_for_reports(&mock_server, 2).await;
    assert_eq!(reports.len(), 2);
    assert!(reports[1].metrics.network_in_bps > 0.0);

    reporter.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_rejected_report_keeps_reporter_running() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/report"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "success": false,
            "message": "authentication failed"
        })))
        .mount(&mock_server)
        .await;

    let (reporter, _config_tx) = spawn_reporter(mock_server.uri());
    wait_for_reports(&mock_server, 1).await;

    let error = reporter.report_now().await.unwrap_err();
    assert!(error.to_string().contains("authentication failed"));

    // still answering commands
    assert!(reporter.report_now().await.is_err());
    assert_eq!(received_reports(&mock_server).await.len(), 3);

    reporter.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reload_switches_collector() {
    let old_server = MockServer::start().await;
    let new_server = MockServer::start().await;
    for server in [&old_server, &new_server] {
        Mock::given(method("POST"))
            .and(path("/api/report"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "message": "report received"
            })))
            .mount(server)
            .await;
    }

    let (reporter, config_tx) = spawn_reporter(old_server.uri());
    wait_for_reports(&old_server, 1).await;

    config_tx.send(agent_config(new_server.uri())).unwrap();
    // let the reporter observe the new config
    tokio::time::sleep(Duration::from_millis(100)).await;

    reporter.report_now().await.unwrap();

    assert_eq!(received_reports(&old_server).await.len(), 1);
    assert_eq!(received_reports(&new_server).await.len(), 1);

    reporter.shutdown().await.unwrap();
}
