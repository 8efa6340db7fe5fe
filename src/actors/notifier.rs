//! NotificationActor - Renders node events and delivers them in order
//!
//! The registry queues the events of each operation here on an unbounded
//! channel while it still holds its lock, so events of one host arrive in
//! transition order and report ingestion never waits on an outbound HTTP call.
//!
//! ## Message Flow
//!
//! ```text
//! NodeRegistry::upsert / sweep → NotificationHandle::deliver_all (under the lock)
//!                                                      ↓
//!                         NotificationActor → Notification::from_event → Notifier
//! ```
//!
//! A failed delivery is logged and dropped. Monitoring state is never rolled
//! back because a message did not arrive.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    alerts::{Notification, Notifier},
    error::{MonitorError, MonitorResult},
};

use super::messages::{NodeEvent, NotificationCommand};

/// Actor that owns the configured notifier
pub struct NotificationActor {
    notifier: Option<Arc<dyn Notifier>>,
    command_rx: mpsc::UnboundedReceiver<NotificationCommand>,
}

impl NotificationActor {
    pub fn new(
        notifier: Option<Arc<dyn Notifier>>,
        command_rx: mpsc::UnboundedReceiver<NotificationCommand>,
    ) -> Self {
        Self {
            notifier,
            command_rx,
        }
    }

    /// Run until a Shutdown command arrives or every handle is dropped.
    ///
    /// Commands are handled one at a time, so a shutdown waits for the
    /// delivery in progress.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting notification actor");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                NotificationCommand::Deliver(event) => self.deliver(&event).await,

                NotificationCommand::SendTest { respond_to } => {
                    let result = self.send_test().await;
                    let _ = respond_to.send(result);
                }

                NotificationCommand::Shutdown => {
                    debug!("received shutdown command");
                    break;
                }
            }
        }

        debug!("notification actor stopped");
    }

    #[instrument(skip(self, event), fields(hostname = %event.hostname()))]
    async fn deliver(&self, event: &NodeEvent) {
        let notification = Notification::from_event(event);

        let Some(notifier) = &self.notifier else {
            debug!("no notifier configured, dropping {}", notification.kind.name());
            return;
        };

        match notifier.notify(&notification).await {
            Ok(()) => debug!("delivered {} via {}", notification.kind.name(), notifier.name()),
            Err(e) => error!(
                "failed to deliver {} via {}: {e}",
                notification.kind.name(),
                notifier.name()
            ),
        }
    }

    async fn send_test(&self) -> MonitorResult<()> {
        let notifier = self
            .notifier
            .as_ref()
            .ok_or(MonitorError::NotifierNotConfigured)?;

        notifier.notify(&Notification::test(Utc::now())).await?;
        info!("test notification sent via {}", notifier.name());
        Ok(())
    }
}

/// Handle for queueing notifications
#[derive(Debug, Clone)]
pub struct NotificationHandle {
    sender: mpsc::UnboundedSender<NotificationCommand>,
    configured: bool,
}

impl NotificationHandle {
    /// Spawn the actor. The returned task finishes after [`Self::shutdown`].
    pub fn spawn(notifier: Option<Arc<dyn Notifier>>) -> (Self, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let configured = notifier.is_some();

        let actor = NotificationActor::new(notifier, cmd_rx);
        let task = tokio::spawn(actor.run());

        (
            Self {
                sender: cmd_tx,
                configured,
            },
            task,
        )
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn deliver(&self, event: NodeEvent) {
        if self.sender.send(NotificationCommand::Deliver(event)).is_err() {
            warn!("notification actor stopped, dropping event");
        }
    }

    pub fn deliver_all(&self, events: impl IntoIterator<Item = NodeEvent>) {
        for event in events {
            self.deliver(event);
        }
    }

    /// Send the connectivity-test message and wait for the outcome
    pub async fn send_test(&self) -> MonitorResult<()> {
        let (tx, rx) = oneshot::channel();
        let stopped = || MonitorError::NotifierFailure("notification actor stopped".to_string());

        self.sender
            .send(NotificationCommand::SendTest { respond_to: tx })
            .map_err(|_| stopped())?;

        rx.await.map_err(|_| stopped())?
    }

    pub fn shutdown(&self) -> Result<()> {
        self.sender
            .send(NotificationCommand::Shutdown)
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
