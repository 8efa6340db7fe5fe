//! Integration tests for the notification channels
//!
//! Each channel is pointed at a wiremock server standing in for the real
//! Telegram, Discord or webhook endpoint.

use chrono::Utc;
use fleetwatch::{
    actors::messages::NodeEvent,
    alerts::{Notification, Notifier, build_notifier},
    config::NotifierConfig,
    error::MonitorError,
    monitors::resources::Metric,
};
use assert_matches::assert_matches;
use reqwest::Client;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cpu_alert() -> Notification {
    Notification::from_event(&NodeEvent::AlertRaised {
        hostname: "h1".to_string(),
        metric: Metric::Cpu,
        value: 97.5,
        threshold: 95.0,
        at: Utc::now(),
    })
}

fn notifier_for(config: Value) -> std::sync::Arc<dyn Notifier> {
    let config: NotifierConfig = serde_json::from_value(config).unwrap();
    build_notifier(&config, Client::new())
}

#[tokio::test]
async fn test_telegram_sends_markdown_message() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_partial_json(json!({
            "chat_id": 42,
            "parse_mode": "Markdown"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let notifier = notifier_for(json!({
        "telegram": {
            "bot_token": "123:abc",
            "chat_id": 42,
            "api_url": mock_server.uri()
        }
    }));

    assert_eq!(notifier.name(), "telegram");
    notifier.notify(&cpu_alert()).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let text = body["text"].as_str().unwrap();
    assert!(text.contains("h1"));
    assert!(text.contains("CPU"));
}

#[tokio::test]
async fn test_telegram_rejection_is_reported() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "description": "Bad Request: chat not found"
        })))
        .mount(&mock_server)
        .await;

    let notifier = notifier_for(json!({
        "telegram": {
            "bot_token": "123:abc",
            "chat_id": 42,
            "api_url": mock_server.uri()
        }
    }));

    let result = notifier.notify(&Notification::test(Utc::now())).await;
    assert_matches!(result, Err(MonitorError::NotifierFailure(msg)) if msg.contains("chat not found"));
}

#[tokio::test]
async fn test_discord_mentions_configured_user() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let notifier = notifier_for(json!({
        "discord": {
            "url": format!("{}/webhook", mock_server.uri()),
            "user_id": "777"
        }
    }));

    notifier.notify(&cpu_alert()).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body["content"].as_str().unwrap().contains("<@777>"));
    assert!(
        body["embeds"][0]["title"]
            .as_str()
            .unwrap()
            .contains("CPU Alert")
    );
}

#[tokio::test]
async fn test_webhook_posts_event_kind() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(json!({
            "host": "h1",
            "kind": "cpu_alert"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let notifier = notifier_for(json!({
        "webhook": { "url": format!("{}/hook", mock_server.uri()) }
    }));

    notifier.notify(&cpu_alert()).await.unwrap();
}

#[tokio::test]
async fn test_webhook_server_error_fails() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let notifier = notifier_for(json!({
        "webhook": { "url": mock_server.uri() }
    }));

    let result = notifier.notify(&cpu_alert()).await;
    assert_matches!(result, Err(MonitorError::NotifierFailure(_)));
}
