use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{info, trace, warn};

use crate::monitors::rate::InterfaceSelector;

pub const DEFAULT_CPU_PERCENT: f64 = 95.0;
pub const DEFAULT_MEMORY_PERCENT: f64 = 95.0;
pub const DEFAULT_BANDWIDTH_MBPS: f64 = 100.0;
pub const DEFAULT_OFFLINE_SECONDS: i64 = 300;
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: i64 = 30;
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
pub const DEFAULT_REPORT_INTERVAL_SECONDS: i64 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: i64 = 10;
pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

/// Interface name prefixes of container bridges, hypervisor and VPN adapters
pub const DEFAULT_VIRTUAL_PREFIXES: [&str; 8] = [
    "veth",
    "docker",
    "br-",
    "virbr",
    "vmnet",
    "zt",
    "tailscale",
    "wg",
];

/// Collector side configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Shared secret every report must carry
    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub listen: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifier: Option<NotifierConfig>,

    #[serde(default)]
    pub thresholds: Thresholds,

    /// Period of the liveness sweep
    #[serde(default)]
    pub sweep_interval_seconds: i64,

    /// Bearer token guarding the status and test endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
}

/// Collector-global alert thresholds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default)]
    pub bandwidth_mbps: f64,
    #[serde(default)]
    pub offline_seconds: i64,
    #[serde(default)]
    pub cpu_percent: f64,
    #[serde(default)]
    pub memory_percent: f64,
}

impl Thresholds {
    pub fn offline_timeout(&self) -> Duration {
        Duration::from_secs(self.offline_seconds.max(0) as u64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifierConfig {
    Telegram(Telegram),
    Discord(Discord),
    Webhook(Webhook),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Telegram {
    pub bot_token: String,
    pub chat_id: i64,
    #[serde(default = "default_telegram_api")]
    pub api_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discord {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    pub url: String,
}

fn default_telegram_api() -> String {
    DEFAULT_TELEGRAM_API.to_string()
}

impl CollectorConfig {
    /// Starter file written when no configuration exists yet
    pub fn template() -> Self {
        let mut config = Self {
            password: "your-password-here".to_string(),
            listen: String::new(),
            notifier: Some(NotifierConfig::Telegram(Telegram {
                bot_token: String::new(),
                chat_id: 0,
                api_url: default_telegram_api(),
            })),
            thresholds: Thresholds::default(),
            sweep_interval_seconds: 0,
            admin_token: None,
        };
        config.apply_defaults();
        config
    }

    /// Fill missing or non-positive fields. Returns whether anything changed.
    pub fn apply_defaults(&mut self) -> bool {
        let mut applied = false;
        let thresholds = &mut self.thresholds;

        if thresholds.cpu_percent <= 0.0 {
            thresholds.cpu_percent = DEFAULT_CPU_PERCENT;
            applied = true;
        }
        if thresholds.memory_percent <= 0.0 {
            thresholds.memory_percent = DEFAULT_MEMORY_PERCENT;
            applied = true;
        }
        if thresholds.bandwidth_mbps <= 0.0 {
            thresholds.bandwidth_mbps = DEFAULT_BANDWIDTH_MBPS;
            applied = true;
        }
        if thresholds.offline_seconds <= 0 {
            thresholds.offline_seconds = DEFAULT_OFFLINE_SECONDS;
            applied = true;
        }
        if self.sweep_interval_seconds <= 0 {
            self.sweep_interval_seconds = DEFAULT_SWEEP_INTERVAL_SECONDS;
            applied = true;
        }
        if self.listen.trim().is_empty() {
            self.listen = DEFAULT_LISTEN.to_string();
            applied = true;
        }

        applied
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.password.is_empty() {
            bail!("collector password must not be empty");
        }
        self.listen_addr()?;
        Ok(())
    }

    /// Listen address; a bare `:port` binds on all interfaces.
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let listen = self.listen.trim();
        let listen = if listen.starts_with(':') {
            format!("0.0.0.0{listen}")
        } else {
            listen.to_string()
        };
        listen
            .parse()
            .with_context(|| format!("invalid listen address '{}'", self.listen))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1) as u64)
    }
}

/// A bandwidth floor active between two times of day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// `HH:MM`
    pub start: String,
    /// `HH:MM`, wraps past midnight when earlier than `start`
    pub end: String,
    pub bandwidth_mbps: f64,
}

impl TimeWindow {
    pub fn new(start: &str, end: &str, bandwidth_mbps: f64) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
            bandwidth_mbps,
        }
    }
}

/// Static bandwidth floor plus an ordered table of time windows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default)]
    pub static_bandwidth_mbps: f64,
    #[serde(default)]
    pub dynamic: Vec<TimeWindow>,
}

/// Agent side configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub password: String,

    /// Base URL of the collector, e.g. `http://monitor.example.com:8080`
    #[serde(default)]
    pub server_url: String,

    #[serde(default)]
    pub hostname: String,

    #[serde(default)]
    pub report_interval_seconds: i64,

    /// Empty means "sum of all physical interfaces"
    #[serde(default)]
    pub interface_name: String,

    #[serde(default)]
    pub threshold: ThresholdConfig,

    #[serde(default)]
    pub virtual_interface_prefixes: Vec<String>,

    #[serde(default)]
    pub request_timeout_seconds: i64,
}

impl AgentConfig {
    pub fn template() -> Self {
        let mut config = Self {
            password: "your-password-here".to_string(),
            server_url: "http://your-server.com:8080".to_string(),
            hostname: String::new(),
            report_interval_seconds: 0,
            interface_name: String::new(),
            threshold: ThresholdConfig::default(),
            virtual_interface_prefixes: vec![],
            request_timeout_seconds: 0,
        };
        config.apply_defaults();
        config
    }

    /// Fill missing fields and upgrade old window tables. Returns whether
    /// anything changed.
    pub fn apply_defaults(&mut self) -> bool {
        let mut applied = false;

        if self.report_interval_seconds <= 0 {
            self.report_interval_seconds = DEFAULT_REPORT_INTERVAL_SECONDS;
            applied = true;
        }
        if self.request_timeout_seconds <= 0 {
            self.request_timeout_seconds = DEFAULT_REQUEST_TIMEOUT_SECONDS;
            applied = true;
        }
        if self.hostname.trim().is_empty() {
            self.hostname = crate::util::local_hostname();
            applied = true;
        }

        match self.threshold.dynamic.len() {
            0 => {
                self.threshold.dynamic = vec![
                    TimeWindow::new("22:00", "02:00", 200.0),
                    TimeWindow::new("02:00", "09:00", 50.0),
                    TimeWindow::new("09:00", "22:00", 100.0),
                ];
                applied = true;
            }
            // two-window tables predate the daytime window
            2 => {
                let old = std::mem::take(&mut self.threshold.dynamic);
                self.threshold.dynamic = vec![
                    TimeWindow::new("22:00", "02:00", old[0].bandwidth_mbps),
                    TimeWindow::new("02:00", "09:00", old[1].bandwidth_mbps),
                    TimeWindow::new("09:00", "22:00", 100.0),
                ];
                applied = true;
            }
            _ => {}
        }

        if self.threshold.static_bandwidth_mbps < 0.0 {
            self.threshold.static_bandwidth_mbps = 0.0;
            applied = true;
        }

        if self.virtual_interface_prefixes.is_empty() {
            self.virtual_interface_prefixes = DEFAULT_VIRTUAL_PREFIXES
                .iter()
                .map(|prefix| prefix.to_string())
                .collect();
            applied = true;
        }

        applied
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.password.is_empty() {
            bail!("agent password must not be empty");
        }
        if self.server_url.trim().is_empty() {
            bail!("server_url must not be empty");
        }
        reqwest::Url::parse(&self.server_url)
            .with_context(|| format!("invalid server_url '{}'", self.server_url))?;
        Ok(())
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_seconds.max(1) as u64)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.max(1) as u64)
    }

    pub fn interface_selector(&self) -> InterfaceSelector {
        let name = self.interface_name.trim();
        if name.is_empty() {
            InterfaceSelector::Aggregate {
                excluded_prefixes: self.virtual_interface_prefixes.clone(),
            }
        } else {
            InterfaceSelector::Named(name.to_string())
        }
    }
}

/// Outcome of looking for a configuration file
#[derive(Debug)]
pub enum Loaded<T> {
    Config(T),
    /// No file existed; a template was written to the path
    TemplateCreated,
}

/// Write a configuration as pretty JSON.
pub fn write_config_file<T: Serialize>(path: &Path, config: &T) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)
        .with_context(|| format!("failed to write config file {}", path.display()))
}

fn read_config_file<T: DeserializeOwned + std::fmt::Debug>(path: &Path) -> anyhow::Result<T> {
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&file_content)
        .with_context(|| format!("invalid configuration file {}", path.display()))
        .inspect(|config| trace!("loaded config: {config:?}"))
}

/// Persist defaults back so operators see the effective values.
fn persist_defaults<T: Serialize>(path: &Path, config: &T) {
    match write_config_file(path, config) {
        Ok(()) => info!("config file updated with defaults: {}", path.display()),
        Err(e) => warn!("failed to save config defaults: {e:#}"),
    }
}

pub fn load_collector_config(path: &Path) -> anyhow::Result<CollectorConfig> {
    let mut config: CollectorConfig = read_config_file(path)?;
    if config.apply_defaults() {
        persist_defaults(path, &config);
    }
    config.validate()?;
    Ok(config)
}

pub fn load_agent_config(path: &Path) -> anyhow::Result<AgentConfig> {
    let mut config: AgentConfig = read_config_file(path)?;
    if config.apply_defaults() {
        persist_defaults(path, &config);
    }
    config.validate()?;
    Ok(config)
}

/// Load a config, or write `template` to `path` when it does not exist.
pub fn load_or_create<T, F>(path: &Path, template: T, load: F) -> anyhow::Result<Loaded<T>>
where
    T: Serialize,
    F: FnOnce(&Path) -> anyhow::Result<T>,
{
    if !path.exists() {
        write_config_file(path, &template).context("failed to create default config file")?;
        return Ok(Loaded::TemplateCreated);
    }
    load(path).map(Loaded::Config)
}
