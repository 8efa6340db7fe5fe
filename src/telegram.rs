use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::{
    alerts::{Notification, Notifier},
    config::Telegram,
    error::{MonitorError, MonitorResult},
};

#[derive(Debug, Clone, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    pub parse_mode: &'static str,
}

/// Envelope of every Bot API response
#[derive(Debug, Clone, Deserialize)]
pub struct BotResponse {
    pub ok: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// Telegram Bot API channel
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    config: Telegram,
}

impl TelegramNotifier {
    pub fn new(config: Telegram, client: Client) -> Self {
        Self { client, config }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_url.trim_end_matches('/'),
            self.config.bot_token
        )
    }

    #[instrument(skip(self, text))]
    pub async fn send_markdown(&self, text: &str) -> MonitorResult<()> {
        let body = SendMessage {
            chat_id: self.config.chat_id,
            text,
            parse_mode: "Markdown",
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| MonitorError::NotifierFailure(e.without_url().to_string()))?;

        let status = response.status();
        let reply: BotResponse = response
            .json()
            .await
            .map_err(|e| MonitorError::NotifierFailure(format!("{status}: {e}")))?;

        if !reply.ok {
            let description = reply.description.unwrap_or_else(|| status.to_string());
            error!("Telegram API rejected message: {description}");
            return Err(MonitorError::NotifierFailure(description));
        }

        debug!("sent Telegram message");
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn notify(&self, notification: &Notification) -> MonitorResult<()> {
        self.send_markdown(&notification.markdown()).await
    }
}
