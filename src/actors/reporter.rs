//! ReporterActor - The agent's report pipeline
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → MetricsSource → RateSampler + threshold → ReportRequest → ReportChannel
//!     ↑                                                         ↑
//!     ├─── Commands (ReportNow, Shutdown)                       │
//!     └─── watch::Receiver<AgentConfig> (interval, interface, secret, url)
//! ```
//!
//! The first report goes out immediately at start-up. A failed report is
//! logged and not retried; the next tick sends a fresh reading.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval, interval_at};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    Reading, ReportRequest, SystemMetrics,
    config::AgentConfig,
    error::MonitorResult,
    monitors::{
        rate::{Rate, RateSampler},
        threshold::effective_threshold_mbps,
    },
    source::{MemoryUsage, MetricsSource},
    transport::ReportChannel,
    util::format_bytes,
};

use super::messages::ReporterCommand;

pub struct ReporterActor {
    source: Box<dyn MetricsSource>,
    sampler: RateSampler,
    channel: Arc<dyn ReportChannel>,
    config: AgentConfig,
    config_rx: watch::Receiver<AgentConfig>,
    command_rx: mpsc::Receiver<ReporterCommand>,
}

impl ReporterActor {
    pub fn new(
        source: Box<dyn MetricsSource>,
        channel: Arc<dyn ReportChannel>,
        config_rx: watch::Receiver<AgentConfig>,
        command_rx: mpsc::Receiver<ReporterCommand>,
    ) -> Self {
        let config = config_rx.borrow().clone();
        let sampler = RateSampler::new(config.interface_selector(), config.report_interval());

        Self {
            source,
            sampler,
            channel,
            config,
            config_rx,
            command_rx,
        }
    }

    #[instrument(skip(self), fields(hostname = %self.config.hostname))]
    pub async fn run(mut self) {
        debug!("starting reporter actor");
        self.log_interface_selection();

        // an Interval fires its first tick immediately
        let mut ticker = Self::ticker(interval(self.config.report_interval()));
        let mut config_open = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.report(Utc::now()).await {
                        error!("failed to send report: {e}");
                    }
                }

                changed = self.config_rx.changed(), if config_open => {
                    match changed {
                        Ok(()) => {
                            let config = self.config_rx.borrow_and_update().clone();
                            if let Some(period) = self.apply_config(config) {
                                ticker = Self::ticker(interval_at(Instant::now() + period, period));
                            }
                        }
                        Err(_) => {
                            debug!("config watcher stopped, keeping current config");
                            config_open = false;
                        }
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        ReporterCommand::ReportNow { respond_to } => {
                            debug!("received ReportNow command");
                            let result = self.report(Utc::now()).await;
                            let _ = respond_to.send(result);
                        }

                        ReporterCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("reporter actor stopped");
    }

    fn ticker(mut ticker: Interval) -> Interval {
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// Swap in a reloaded config. Returns the new report interval when it
    /// changed.
    pub fn apply_config(&mut self, config: AgentConfig) -> Option<Duration> {
        if config == self.config {
            return None;
        }

        let selector = config.interface_selector();
        let selection_changed = &selector != self.sampler.selector();
        self.sampler.set_selector(selector);
        self.sampler.set_nominal_interval(config.report_interval());

        let interval_changed = config.report_interval() != self.config.report_interval();
        self.config = config;
        info!("configuration reloaded");

        if selection_changed {
            self.log_interface_selection();
        }

        if interval_changed {
            info!("report interval changed to {:?}", self.config.report_interval());
            Some(self.config.report_interval())
        } else {
            None
        }
    }

    fn log_interface_selection(&mut self) {
        match self.source.interface_counters() {
            Ok(counters) => info!("monitoring {}", self.sampler.selector().describe(&counters)),
            Err(e) => warn!("could not list network interfaces: {e}"),
        }
    }

    /// Gather one reading. A failing source call degrades its own field to
    /// zero and never aborts the tick.
    pub fn collect_reading(&mut self, now: DateTime<Utc>) -> Reading {
        let cpu_percent = self.source.cpu_percent().unwrap_or_else(|e| {
            warn!("{e}, reporting cpu as 0");
            0.0
        });

        let memory = self.source.memory().unwrap_or_else(|e| {
            warn!("{e}, reporting memory as 0");
            MemoryUsage::default()
        });

        let uptime_seconds = self.source.uptime_seconds().unwrap_or_else(|e| {
            warn!("{e}, reporting uptime as 0");
            0
        });

        let rate = match self
            .source
            .interface_counters()
            .and_then(|counters| self.sampler.sample(&counters, now))
        {
            Ok(rate) => rate,
            Err(e) => {
                warn!("{e}, reporting network rate as 0/0");
                Rate::default()
            }
        };

        let threshold = effective_threshold_mbps(
            now.with_timezone(&Local).time(),
            &self.config.threshold,
        );

        Reading {
            metrics: SystemMetrics {
                cpu_percent,
                memory_used: memory.used,
                memory_total: memory.total,
                network_in_bps: rate.in_bps,
                network_out_bps: rate.out_bps,
                uptime_seconds,
            },
            captured_at: now,
            effective_threshold_mbps: (threshold > 0.0).then_some(threshold),
        }
    }

    pub fn build_request(&self, reading: &Reading) -> ReportRequest {
        ReportRequest {
            password: self.config.password.clone(),
            hostname: self.config.hostname.clone(),
            timestamp: reading.captured_at.timestamp(),
            metrics: reading.metrics.clone(),
            effective_threshold_mbps: reading.effective_threshold_mbps.unwrap_or(0.0),
        }
    }

    async fn report(&mut self, now: DateTime<Utc>) -> MonitorResult<Reading> {
        let reading = self.collect_reading(now);
        let request = self.build_request(&reading);

        self.channel.send(&self.config.server_url, &request).await?;

        let metrics = &reading.metrics;
        info!(
            "report sent: cpu {:.2}%, memory {}/{}, in {:.2} Mbps, out {:.2} Mbps, threshold {}",
            metrics.cpu_percent,
            format_bytes(metrics.memory_used),
            format_bytes(metrics.memory_total),
            metrics.network_in_bps / crate::BYTES_PER_MEGABIT,
            metrics.network_out_bps / crate::BYTES_PER_MEGABIT,
            reading
                .effective_threshold_mbps
                .map_or_else(|| "none".to_string(), |t| format!("{t:.2} Mbps")),
        );

        Ok(reading)
    }
}

/// Handle for controlling a ReporterActor
#[derive(Clone)]
pub struct ReporterHandle {
    sender: mpsc::Sender<ReporterCommand>,
}

impl ReporterHandle {
    pub fn spawn(
        source: Box<dyn MetricsSource>,
        channel: Arc<dyn ReportChannel>,
        config_rx: watch::Receiver<AgentConfig>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let actor = ReporterActor::new(source, channel, config_rx, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Collect and send a report now, bypassing the timer
    pub async fn report_now(&self) -> Result<Reading> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ReporterCommand::ReportNow { respond_to: tx })
            .await
            .context("failed to send ReportNow command")?;

        Ok(rx.await.context("failed to receive response")??)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(ReporterCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
