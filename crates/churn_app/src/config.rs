use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use churn_core::RetryPolicy;
use churn_engine::{CaptureSettings, ClientSettings, DEFAULT_LOCK_TTL};
use engine_logging::engine_debug;
use serde::{Deserialize, Serialize};

use crate::logging::{LogDestination, LogLevel};

pub const DEFAULT_CONFIG_FILE: &str = "churnwatch.ron";

/// Settings read from the RON config file. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub base_url: String,
    pub lock_ttl_secs: u64,
    pub max_transient_retries: u32,
    pub log_destination: LogDestination,
    pub log_level: LogLevel,
    /// Account used when `--account` is not given.
    pub account: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./churnwatch-data"),
            base_url: ClientSettings::default().base_url,
            lock_ttl_secs: DEFAULT_LOCK_TTL.as_secs(),
            max_transient_retries: RetryPolicy::default().max_transient_retries,
            log_destination: LogDestination::default(),
            log_level: LogLevel::default(),
            account: None,
        }
    }
}

impl AppConfig {
    /// Loads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read config {path:?}"));
            }
        };
        let config: AppConfig =
            ron::from_str(&content).with_context(|| format!("failed to parse config {path:?}"))?;
        config.validate().with_context(|| format!("invalid config {path:?}"))?;
        engine_debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lock_ttl_secs == 0 {
            bail!("lock_ttl_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.data_dir.join("locks")
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.data_dir.join("snapshots")
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.base_url.clone(),
            ..ClientSettings::default()
        }
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        let defaults = CaptureSettings::default();
        CaptureSettings {
            lock_ttl: Duration::from_secs(self.lock_ttl_secs),
            retry: RetryPolicy {
                max_transient_retries: self.max_transient_retries,
                ..defaults.retry
            },
            ..defaults
        }
    }
}
