use std::path::PathBuf;

use sysinfo::System;
use tracing::level_filters::LevelFilter;

const CONFIG_PATH: &str = "FLEETWATCH_CONFIG";

/// Config file path: explicit argument, then `FLEETWATCH_CONFIG`, then `default`.
pub fn get_config_path(explicit: Option<String>, default: &str) -> PathBuf {
    explicit
        .or_else(|| std::env::var(CONFIG_PATH).ok())
        .map_or_else(|| PathBuf::from(default), PathBuf::from)
}

const LOG_LEVEL: &str = "FLEETWATCH_LOG";

const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::INFO;

pub fn get_log_level() -> LevelFilter {
    let level_from_env = std::env::var(LOG_LEVEL);
    level_from_env.map_or(DEFAULT_LOG_LEVEL, |res| {
        res.parse().unwrap_or(DEFAULT_LOG_LEVEL)
    })
}

pub fn local_hostname() -> String {
    System::host_name()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| String::from("unknown"))
}

/// Human readable byte count with binary units, e.g. `1.5 GB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    const PREFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

    if bytes < UNIT {
        return format!("{bytes} B");
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    format!("{:.1} {}B", bytes as f64 / div as f64, PREFIXES[exp])
}
