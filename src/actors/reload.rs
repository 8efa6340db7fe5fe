//! ConfigWatcher - Hot reload of a configuration file
//!
//! Polls the file's modification time and publishes every successfully
//! loaded, changed configuration through a `watch` channel. Readers always
//! see one complete configuration. A reload that fails to load or validate is
//! logged and the previous configuration stays in effect.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, instrument, warn};

pub const RELOAD_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Loads and validates a configuration from a path
pub type LoadFn<T> = fn(&Path) -> anyhow::Result<T>;

pub struct ConfigWatcher<T> {
    path: PathBuf,
    load: LoadFn<T>,
    last_modified: Option<SystemTime>,
    sender: watch::Sender<T>,
}

impl<T> ConfigWatcher<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(path: impl Into<PathBuf>, initial: T, load: LoadFn<T>) -> (Self, watch::Receiver<T>) {
        let path = path.into();
        let (sender, receiver) = watch::channel(initial);
        let last_modified = modified(&path);

        (
            Self {
                path,
                load,
                last_modified,
                sender,
            },
            receiver,
        )
    }

    /// Spawn the polling loop. It stops once every receiver is dropped.
    pub fn spawn(
        path: impl Into<PathBuf>,
        initial: T,
        load: LoadFn<T>,
        poll: Duration,
    ) -> (watch::Receiver<T>, JoinHandle<()>) {
        let (watcher, receiver) = Self::new(path, initial, load);
        let task = tokio::spawn(watcher.run(poll));
        (receiver, task)
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn run(mut self, poll: Duration) {
        debug!("watching configuration file");

        let mut ticker = interval_at(Instant::now() + poll, poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check();
                }

                _ = self.sender.closed() => {
                    debug!("no configuration readers left");
                    break;
                }
            }
        }
    }

    /// Reload if the modification time moved. Returns whether a new
    /// configuration was published.
    pub fn check(&mut self) -> bool {
        let current = modified(&self.path);
        if current.is_none() || current == self.last_modified {
            return false;
        }
        self.last_modified = current;

        match (self.load)(&self.path) {
            Ok(config) => {
                let published = self.sender.send_if_modified(|active| {
                    if *active == config {
                        return false;
                    }
                    *active = config;
                    true
                });
                if published {
                    info!("configuration reloaded from {}", self.path.display());
                } else {
                    debug!("configuration file touched without changes");
                }
                published
            }
            Err(e) => {
                warn!("failed to reload configuration, keeping previous: {e:#}");
                false
            }
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|meta| meta.modified()).ok()
}
