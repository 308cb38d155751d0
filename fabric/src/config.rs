//! Daemon configuration from environment variables
//!
//! Every knob has a default suitable for an on-device deployment;
//! `LORAN_*` variables override them. Values are validated up front so
//! a bad deployment fails at startup instead of mid-flight.

use crate::endpoint::Address;
use crate::error::{FabricError, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, for log shippers
    Json,
    /// Human-readable console output
    Pretty,
}

impl FromStr for LogFormat {
    type Err = FabricError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(FabricError::Config(format!(
                "unknown log format '{other}', expected 'json' or 'pretty'"
            ))),
        }
    }
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Default tracing filter when `RUST_LOG` is unset (`LORAN_LOG_LEVEL`)
    pub log_level: String,
    /// Log output format (`LORAN_LOG_FORMAT`)
    pub log_format: LogFormat,
    /// Persisted settings file (`LORAN_SETTINGS_PATH`)
    pub settings_path: PathBuf,
    /// Address of the daemon's outbound PUB endpoint (`LORAN_PUB_ADDR`)
    pub pub_addr: String,
    /// Address of the daemon's inbound SUB endpoint (`LORAN_SUB_ADDR`)
    pub sub_addr: String,
    /// Period between metrics snapshots in the log (`LORAN_STATS_INTERVAL_MS`)
    pub stats_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            settings_path: PathBuf::from("/persistent/config.ini"),
            pub_addr: "@ipc:///var/run/loran/external.pub".to_string(),
            sub_addr: "@ipc:///var/run/loran/external.sub".to_string(),
            stats_interval: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load configuration, applying `LORAN_*` overrides to the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("LORAN_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Ok(format) = std::env::var("LORAN_LOG_FORMAT") {
            config.log_format = format.parse()?;
        }
        if let Ok(path) = std::env::var("LORAN_SETTINGS_PATH") {
            config.settings_path = PathBuf::from(path);
        }
        if let Ok(addr) = std::env::var("LORAN_PUB_ADDR") {
            config.pub_addr = addr;
        }
        if let Ok(addr) = std::env::var("LORAN_SUB_ADDR") {
            config.sub_addr = addr;
        }
        if let Ok(raw) = std::env::var("LORAN_STATS_INTERVAL_MS") {
            let ms: u64 = raw.parse().map_err(|_| {
                FabricError::Config(format!("invalid LORAN_STATS_INTERVAL_MS '{raw}'"))
            })?;
            config.stats_interval = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.pub_addr.parse::<Address>()?;
        self.sub_addr.parse::<Address>()?;
        if self.stats_interval.is_zero() {
            return Err(FabricError::Config(
                "stats interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
