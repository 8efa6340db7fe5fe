//! Notification rendering and delivery channels
//!
//! A [`NodeEvent`] is rendered into a channel-independent [`Notification`]
//! once, then handed to whichever [`Notifier`] the collector is configured
//! with.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, instrument};

use crate::{
    actors::messages::NodeEvent,
    config::{NotifierConfig, Webhook},
    discord::DiscordNotifier,
    error::{MonitorError, MonitorResult},
    monitors::resources::Metric,
    telegram::TelegramNotifier,
};

/// What a notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    NodeOnline,
    NodeBackOnline,
    NodeOffline,
    AlertRaised(Metric),
    Recovered(Metric),
    Test,
}

impl NotificationKind {
    /// Stable identifier used by the generic webhook channel
    pub fn name(&self) -> String {
        match self {
            NotificationKind::NodeOnline => "node_online".to_string(),
            NotificationKind::NodeBackOnline => "node_back_online".to_string(),
            NotificationKind::NodeOffline => "node_offline".to_string(),
            NotificationKind::AlertRaised(metric) => format!("{}_alert", metric_key(*metric)),
            NotificationKind::Recovered(metric) => format!("{}_recovered", metric_key(*metric)),
            NotificationKind::Test => "test".to_string(),
        }
    }

    /// Whether this notification reports a problem rather than a recovery
    pub fn is_problem(&self) -> bool {
        matches!(
            self,
            NotificationKind::NodeOffline | NotificationKind::AlertRaised(_)
        )
    }

    fn emoji(&self) -> &'static str {
        match self {
            NotificationKind::NodeOnline | NotificationKind::NodeBackOnline => "✅",
            NotificationKind::NodeOffline => "❌",
            NotificationKind::AlertRaised(Metric::Bandwidth) => "🚨",
            NotificationKind::AlertRaised(Metric::Cpu) => "🔥",
            NotificationKind::AlertRaised(Metric::Memory) => "💾",
            NotificationKind::Recovered(Metric::Cpu) => "✅",
            NotificationKind::Recovered(_) => "🟢",
            NotificationKind::Test => "🤖",
        }
    }

    fn title(&self) -> String {
        match self {
            NotificationKind::NodeOnline => "Node Online".to_string(),
            NotificationKind::NodeBackOnline => "Node Back Online".to_string(),
            NotificationKind::NodeOffline => "Node Offline".to_string(),
            NotificationKind::AlertRaised(metric) => format!("{} Alert", metric.label()),
            NotificationKind::Recovered(metric) => format!("{} Recovered", metric.label()),
            NotificationKind::Test => "Fleetwatch".to_string(),
        }
    }
}

fn metric_key(metric: Metric) -> &'static str {
    match metric {
        Metric::Bandwidth => "bandwidth",
        Metric::Cpu => "cpu",
        Metric::Memory => "memory",
    }
}

/// One labelled line of a notification
#[derive(Debug, Clone, PartialEq)]
pub struct Detail {
    pub label: String,
    pub value: String,
}

impl Detail {
    fn new(label: impl ToString, value: impl ToString) -> Self {
        Self {
            label: label.to_string(),
            value: value.to_string(),
        }
    }
}

/// Channel-independent rendering of an event
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub host: Option<String>,
    pub title: String,
    pub emoji: &'static str,
    /// One sentence describing the event
    pub summary: String,
    pub details: Vec<Detail>,
    /// Current value and threshold for metric notifications
    pub reading: Option<(f64, f64)>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    fn new(kind: NotificationKind, host: Option<&str>, summary: String, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            host: host.map(str::to_string),
            title: kind.title(),
            emoji: kind.emoji(),
            summary,
            details: vec![],
            reading: None,
            timestamp: at,
        }
    }

    pub fn from_event(event: &NodeEvent) -> Self {
        match event {
            NodeEvent::Online {
                hostname,
                first_seen,
                at,
            } => {
                let (kind, summary) = if *first_seen {
                    (
                        NotificationKind::NodeOnline,
                        format!("Node {hostname} reported for the first time"),
                    )
                } else {
                    (
                        NotificationKind::NodeBackOnline,
                        format!("Node {hostname} is reporting again"),
                    )
                };
                Self::new(kind, Some(hostname.as_str()), summary, *at)
                    .with_detail("Node", hostname)
                    .with_time()
            }

            NodeEvent::Offline {
                hostname,
                silent_for,
                at,
                ..
            } => {
                let minutes = silent_for.as_secs_f64() / 60.0;
                Self::new(
                    NotificationKind::NodeOffline,
                    Some(hostname.as_str()),
                    format!("Node {hostname} stopped reporting"),
                    *at,
                )
                .with_detail("Node", hostname)
                .with_detail("Offline for", format!("{minutes:.0} min"))
                .with_time()
            }

            NodeEvent::AlertRaised {
                hostname,
                metric,
                value,
                threshold,
                at,
            } => {
                let direction = match metric {
                    Metric::Bandwidth => "dropped below",
                    Metric::Cpu | Metric::Memory => "exceeded",
                };
                Self::metric(
                    NotificationKind::AlertRaised(*metric),
                    *metric,
                    hostname,
                    format!("{} of {hostname} {direction} its threshold", metric.label()),
                    (*value, *threshold),
                    *at,
                )
            }

            NodeEvent::Recovered {
                hostname,
                metric,
                value,
                threshold,
                at,
            } => Self::metric(
                NotificationKind::Recovered(*metric),
                *metric,
                hostname,
                format!("{} of {hostname} is back to normal", metric.label()),
                (*value, *threshold),
                *at,
            ),
        }
    }

    fn metric(
        kind: NotificationKind,
        metric: Metric,
        hostname: &str,
        summary: String,
        (value, threshold): (f64, f64),
        at: DateTime<Utc>,
    ) -> Self {
        let unit = metric.unit();

        let mut notification = Self::new(kind, Some(hostname), summary, at)
            .with_detail("Node", hostname)
            .with_detail(format!("Current {}", metric.label()), format!("{value:.2}{unit}"))
            .with_detail("Threshold", format!("{threshold:.2}{unit}"))
            .with_time();
        notification.reading = Some((value, threshold));
        notification
    }

    /// The fixed connectivity-test message
    pub fn test(at: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::Test,
            None,
            "Test message sent successfully!".to_string(),
            at,
        )
    }

    fn with_detail(mut self, label: impl ToString, value: impl ToString) -> Self {
        self.details.push(Detail::new(label, value));
        self
    }

    fn with_time(self) -> Self {
        let time = self.local_time();
        self.with_detail("Time", time)
    }

    /// Timestamp as `YYYY-MM-DD HH:MM:SS` in the collector's local time zone
    pub fn local_time(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    /// Telegram flavoured Markdown
    pub fn markdown(&self) -> String {
        let mut text = format!("{} *{}*\n\n", self.emoji, self.title);
        if self.details.is_empty() {
            text.push_str(&self.summary);
        } else {
            let lines = self
                .details
                .iter()
                .map(|detail| format!("{}: `{}`", detail.label, detail.value))
                .collect::<Vec<_>>();
            text.push_str(&lines.join("\n"));
        }
        text
    }

    /// Single line plain text
    pub fn plain_text(&self) -> String {
        let mut text = format!("{} {}: {}", self.emoji, self.title, self.summary);
        if let Some((value, threshold)) = self.reading {
            let unit = match self.kind {
                NotificationKind::AlertRaised(metric) | NotificationKind::Recovered(metric) => {
                    metric.unit()
                }
                _ => "",
            };
            text.push_str(&format!(" ({value:.2}{unit}, threshold {threshold:.2}{unit})"));
        }
        text
    }
}

/// An outbound notification channel
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, notification: &Notification) -> MonitorResult<()>;
}

/// Build the configured channel; all channels share one HTTP client.
pub fn build_notifier(config: &NotifierConfig, client: Client) -> Arc<dyn Notifier> {
    match config {
        NotifierConfig::Telegram(telegram) => {
            Arc::new(TelegramNotifier::new(telegram.clone(), client))
        }
        NotifierConfig::Discord(discord) => Arc::new(DiscordNotifier::new(discord.clone(), client)),
        NotifierConfig::Webhook(webhook) => Arc::new(WebhookNotifier::new(webhook.clone(), client)),
    }
}

/// Generic JSON webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    webhook: Webhook,
}

impl WebhookNotifier {
    pub fn new(webhook: Webhook, client: Client) -> Self {
        Self { client, webhook }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    #[instrument(skip(self, notification), fields(kind = %notification.kind.name()))]
    async fn notify(&self, notification: &Notification) -> MonitorResult<()> {
        let payload = json!({
            "message": notification.plain_text(),
            "host": notification.host,
            "kind": notification.kind.name(),
            "timestamp": notification.timestamp.to_rfc3339(),
        });

        let response = self
            .client
            .post(&self.webhook.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| MonitorError::NotifierFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::NotifierFailure(format!(
                "webhook responded with {status}"
            )));
        }

        debug!("sent webhook notification");
        Ok(())
    }
}
