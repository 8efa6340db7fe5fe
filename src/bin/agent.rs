use std::sync::Arc;

use clap::Parser;
use fleetwatch::{
    actors::{
        reload::{ConfigWatcher, RELOAD_POLL_INTERVAL},
        reporter::ReporterHandle,
    },
    config::{AgentConfig, Loaded, load_agent_config, load_or_create},
    source::SysinfoSource,
    transport::HttpReportChannel,
    util::{get_config_path, get_log_level},
};
use tracing::{error, info, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG_FILE: &str = "client.json";

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Reports host metrics to a fleetwatch collector")]
struct Args {
    /// Config file (defaults to $FLEETWATCH_CONFIG or client.json)
    #[arg(short, long)]
    file: Option<String>,
}

fn init() {
    dotenv::dotenv().ok();

    let level = get_log_level();
    let filter = filter::Targets::new()
        .with_targets(vec![("fleetwatch", level), ("fleetwatch_agent", level)]);
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let path = get_config_path(args.file, DEFAULT_CONFIG_FILE);
    let config = match load_or_create(&path, AgentConfig::template(), load_agent_config)? {
        Loaded::Config(config) => config,
        Loaded::TemplateCreated => {
            info!(
                "created configuration template at {}, edit it and start again",
                path.display()
            );
            return Ok(());
        }
    };

    info!(
        "reporting as {} to {} every {}s",
        config.hostname, config.server_url, config.report_interval_seconds
    );

    let channel = Arc::new(HttpReportChannel::new(config.request_timeout())?);
    let (config_rx, _watcher) =
        ConfigWatcher::spawn(path, config, load_agent_config, RELOAD_POLL_INTERVAL);

    let reporter = ReporterHandle::spawn(Box::new(SysinfoSource::new()), channel, config_rx);

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
    }
    info!("shutting down");
    reporter.shutdown().await?;

    Ok(())
}
