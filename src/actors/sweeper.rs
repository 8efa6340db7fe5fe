//! LivenessSweeper - Periodically marks silent nodes offline
//!
//! Runs on its own timer, independent of any node's report interval. Offline
//! events reach the notifier through the registry, which queues them before
//! releasing its lock.
//!
//! ```text
//! Timer tick → NodeRegistry::sweep → Offline events
//!     ↑
//!     └─── Commands (SweepNow, Shutdown)
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, interval_at};
use tracing::{debug, instrument, trace, warn};

use crate::registry::NodeRegistry;

use super::messages::{NodeEvent, SweeperCommand};

pub struct LivenessSweeper {
    registry: NodeRegistry,
    period: Duration,
    command_rx: mpsc::Receiver<SweeperCommand>,
}

impl LivenessSweeper {
    pub fn new(
        registry: NodeRegistry,
        period: Duration,
        command_rx: mpsc::Receiver<SweeperCommand>,
    ) -> Self {
        Self {
            registry,
            period,
            command_rx,
        }
    }

    #[instrument(skip(self), fields(period = ?self.period))]
    pub async fn run(mut self) {
        debug!("starting liveness sweeper");

        // the first sweep is one period after start
        let mut ticker = interval_at(Instant::now() + self.period, self.period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        SweeperCommand::SweepNow { respond_to } => {
                            debug!("received SweepNow command");
                            let events = self.sweep().await;
                            let _ = respond_to.send(events);
                        }

                        SweeperCommand::Shutdown => {
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

        debug!("liveness sweeper stopped");
    }

    async fn sweep(&self) -> Vec<NodeEvent> {
        let events = self.registry.sweep().await;
        trace!("sweep found {} offline node(s)", events.len());
        events
    }
}

/// Handle for controlling a LivenessSweeper
#[derive(Clone)]
pub struct SweeperHandle {
    sender: mpsc::Sender<SweeperCommand>,
}

impl SweeperHandle {
    pub fn spawn(registry: NodeRegistry, period: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let actor = LivenessSweeper::new(registry, period, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Sweep immediately and return the produced events
    pub async fn sweep_now(&self) -> Result<Vec<NodeEvent>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SweeperCommand::SweepNow { respond_to: tx })
            .await
            .context("failed to send SweepNow command")?;

        rx.await.context("failed to receive response")
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SweeperCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
