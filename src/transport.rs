//! Agent to collector report delivery

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{instrument, trace};

use crate::{
    ApiResponse, ReportRequest,
    error::{MonitorError, MonitorResult},
};

pub const REPORT_PATH: &str = "/api/report";

/// Where finished reports go
#[async_trait]
pub trait ReportChannel: Send + Sync {
    async fn send(&self, server_url: &str, report: &ReportRequest) -> MonitorResult<()>;
}

/// POSTs reports as JSON to `{server_url}/api/report`
#[derive(Debug, Clone)]
pub struct HttpReportChannel {
    client: Client,
}

impl HttpReportChannel {
    pub fn new(timeout: Duration) -> MonitorResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn report_url(server_url: &str) -> String {
        format!("{}{REPORT_PATH}", server_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ReportChannel for HttpReportChannel {
    #[instrument(skip(self, report), fields(hostname = %report.hostname))]
    async fn send(&self, server_url: &str, report: &ReportRequest) -> MonitorResult<()> {
        let url = Self::report_url(server_url);
        trace!("posting report to {url}");

        let response = self.client.post(&url).json(report).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let reply: ApiResponse = serde_json::from_str(&body).map_err(|_| {
            MonitorError::TransportFailure(format!("unexpected response ({status}): {body}"))
        })?;

        if !status.is_success() || !reply.success {
            return Err(MonitorError::TransportFailure(format!(
                "collector rejected report ({status}): {}",
                reply.message
            )));
        }

        Ok(())
    }
}
