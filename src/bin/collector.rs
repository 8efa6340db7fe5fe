use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use fleetwatch::{
    actors::{notifier::NotificationHandle, sweeper::SweeperHandle},
    alerts::build_notifier,
    api::{ApiConfig, ApiState, spawn_api_server},
    config::{CollectorConfig, Loaded, load_collector_config, load_or_create},
    registry::NodeRegistry,
    util::{get_config_path, get_log_level},
};
use tracing::{error, info, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG_FILE: &str = "config.json";

const NOTIFIER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Collects agent reports and alerts on fleet health")]
struct Args {
    /// Config file (defaults to $FLEETWATCH_CONFIG or config.json)
    #[arg(short, long)]
    file: Option<String>,
}

fn init() {
    dotenv::dotenv().ok();

    let level = get_log_level();
    let filter = filter::Targets::new().with_targets(vec![
        ("fleetwatch", level),
        ("fleetwatch_collector", level),
        ("tower_http", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
        return;
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let path = get_config_path(args.file, DEFAULT_CONFIG_FILE);
    let config = match load_or_create(&path, CollectorConfig::template(), load_collector_config)? {
        Loaded::Config(config) => config,
        Loaded::TemplateCreated => {
            info!(
                "created configuration template at {}, edit it and start again",
                path.display()
            );
            return Ok(());
        }
    };

    let api_config = ApiConfig::from_collector(&config)?;

    let client = reqwest::Client::builder()
        .timeout(NOTIFIER_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;
    let notifier = config
        .notifier
        .as_ref()
        .map(|notifier| build_notifier(notifier, client));
    match &notifier {
        Some(notifier) => info!("notifications via {}", notifier.name()),
        None => warn!("no notifier configured, notifications are disabled"),
    }

    let (notifications, notification_task) = NotificationHandle::spawn(notifier);
    let registry =
        NodeRegistry::new(config.thresholds.clone()).with_notifications(notifications.clone());
    let sweeper = SweeperHandle::spawn(registry.clone(), config.sweep_interval());

    info!(
        "thresholds: cpu {}%, memory {}%, bandwidth {} Mbps, offline after {}s",
        config.thresholds.cpu_percent,
        config.thresholds.memory_percent,
        config.thresholds.bandwidth_mbps,
        config.thresholds.offline_seconds
    );

    let state = ApiState::new(registry, notifications.clone(), config.password.as_str());
    let (addr, server) = spawn_api_server(api_config, state, shutdown_signal())
        .await
        .with_context(|| format!("failed to listen on {}", config.listen))?;
    info!("collector listening on {addr}");

    server.await.context("API server task failed")?;

    sweeper.shutdown().await?;
    notifications.shutdown()?;
    notification_task
        .await
        .context("notification task failed")?;

    Ok(())
}
