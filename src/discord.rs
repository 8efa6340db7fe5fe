use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::{
    alerts::{Notification, NotificationKind, Notifier},
    config::Discord,
    error::{MonitorError, MonitorResult},
};

const RED: u32 = 15158332;
const GREEN: u32 = 3066993;
const LIGHT_BLUE: u32 = 5793266;

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Default)]
pub struct MessageBuilder {
    content: Option<String>,
    embeds: Vec<Embed>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl ToString) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn add_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn build(self) -> Message {
        Message {
            content: self.content,
            embeds: self.embeds,
        }
    }
}

/// Discord webhook channel
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: Client,
    config: Discord,
}

impl DiscordNotifier {
    pub fn new(config: Discord, client: Client) -> Self {
        Self { client, config }
    }

    pub fn build_embed(notification: &Notification) -> Embed {
        let color = match notification.kind {
            NotificationKind::Test => LIGHT_BLUE,
            kind if kind.is_problem() => RED,
            _ => GREEN,
        };

        let mut fields = notification
            .details
            .iter()
            .filter(|detail| detail.label != "Time")
            .map(|detail| EmbedField {
                name: detail.label.clone(),
                value: detail.value.clone(),
                inline: true,
            })
            .collect::<Vec<_>>();

        if let Some((value, threshold)) = notification.reading {
            fields.push(EmbedField {
                name: "📊 Status".to_string(),
                value: create_progress_bar(value, threshold),
                inline: false,
            });
        }

        Embed {
            title: Some(format!("{} {}", notification.emoji, notification.title)),
            description: Some(notification.summary.clone()),
            color: Some(color),
            fields,
            footer: notification.host.as_ref().map(|host| EmbedFooter {
                text: format!("Node: {host}"),
            }),
            timestamp: Some(notification.timestamp.to_rfc3339()),
        }
    }

    pub fn build_message(&self, notification: &Notification) -> Message {
        let mut builder = MessageBuilder::new().add_embed(Self::build_embed(notification));
        if let Some(user_id) = &self.config.user_id
            && notification.kind != NotificationKind::Test
        {
            let host = notification.host.as_deref().unwrap_or_default();
            builder = builder.content(format!("{} (`{host}`) <@{user_id}>", notification.emoji));
        }
        builder.build()
    }

    #[instrument(skip(self, message))]
    pub async fn send_message(&self, message: &Message) -> MonitorResult<()> {
        let response = self
            .client
            .post(&self.config.url)
            .json(message)
            .send()
            .await
            .map_err(|e| MonitorError::NotifierFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Discord API error response: {error_text}");
            return Err(MonitorError::NotifierFailure(format!(
                "discord responded with {status}"
            )));
        }

        debug!("sent Discord message");
        Ok(())
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn notify(&self, notification: &Notification) -> MonitorResult<()> {
        self.send_message(&self.build_message(notification)).await
    }
}

/// Ten-cell bar of `current` relative to `limit`
fn create_progress_bar(current: f64, limit: f64) -> String {
    if limit <= 0.0 {
        return String::new();
    }

    let ratio = current / limit;
    let percentage = ratio * 100.0;
    let filled = ((ratio * 10.0).max(0.0) as usize).min(10);
    let bar = "█".repeat(filled) + &"░".repeat(10 - filled);

    let status_emoji = if percentage >= 100.0 {
        "🔴"
    } else if percentage >= 80.0 {
        "🟠"
    } else if percentage >= 60.0 {
        "🟡"
    } else {
        "🟢"
    };

    format!("{status_emoji} `{bar}` {percentage:.1}% of limit")
}
