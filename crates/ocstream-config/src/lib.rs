//! Collector process configuration.
//!
//! Layered with figment: built-in defaults, then a TOML file, then
//! `OCSTREAM_`-prefixed environment variables (`__` separates nested
//! keys, e.g. `OCSTREAM_SINK__DATABASE`). Device definitions are not
//! part of this file; they live in the device store at `store_path`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ocstream_core::{DEFAULT_BATCH_SIZE, InfluxConfig, Precision, SessionTiming};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level collector configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CollectorConfig {
    /// Device store file. Defaults to `devices.json` in the platform
    /// data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub sink: SinkConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

/// Admin HTTP API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_listen(),
        }
    }
}

/// InfluxDB sink.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SinkConfig {
    #[serde(default = "default_sink_url")]
    pub url: String,

    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Plaintext here; wrapped in a `SecretString` once resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default)]
    pub precision: Precision,

    /// Points buffered before a write; the batch is written once it
    /// grows past this size.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Capacity of the record queue between sessions and the sink.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            url: default_sink_url(),
            database: default_database(),
            username: None,
            password: None,
            precision: Precision::default(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Session timing overrides, in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    #[serde(default = "default_recv_error_cooldown")]
    pub recv_error_cooldown_secs: u64,

    /// 0 disables periodic session statistics.
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry_delay_secs: default_retry_delay(),
            recv_error_cooldown_secs: default_recv_error_cooldown(),
            stats_interval_secs: default_stats_interval(),
            connect_timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_listen() -> String {
    "0.0.0.0:8888".into()
}
fn default_sink_url() -> String {
    "http://localhost:8086".into()
}
fn default_database() -> String {
    "ot".into()
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_queue_capacity() -> usize {
    1024
}
fn default_retry_delay() -> u64 {
    10
}
fn default_recv_error_cooldown() -> u64 {
    60
}
fn default_stats_interval() -> u64 {
    60
}

// ── Resolution ──────────────────────────────────────────────────────

impl CollectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sink.batch_size == 0 {
            return Err(invalid("sink.batch_size", "must be at least 1"));
        }
        if self.sink.queue_capacity == 0 {
            return Err(invalid("sink.queue_capacity", "must be at least 1"));
        }
        if self.sink.database.trim().is_empty() {
            return Err(invalid("sink.database", "must not be empty"));
        }
        self.sink_url()?;
        if self.admin.enabled {
            self.listen_addr()?;
        }
        Ok(())
    }

    /// Device store file, falling back to the platform data directory.
    pub fn store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(default_store_path)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.admin
            .listen
            .parse()
            .map_err(|_| {
                invalid(
                    "admin.listen",
                    format!("not a socket address: {}", self.admin.listen),
                )
            })
    }

    fn sink_url(&self) -> Result<url::Url, ConfigError> {
        self.sink
            .url
            .parse()
            .map_err(|e| invalid("sink.url", format!("{e}: {}", self.sink.url)))
    }

    /// Settings for the InfluxDB client.
    pub fn influx_config(&self) -> Result<InfluxConfig, ConfigError> {
        Ok(InfluxConfig {
            url: self.sink_url()?,
            database: self.sink.database.clone(),
            username: self.sink.username.clone().filter(|u| !u.is_empty()),
            password: self
                .sink
                .password
                .clone()
                .filter(|p| !p.is_empty())
                .map(SecretString::from),
            precision: self.sink.precision,
            timeout: Duration::from_secs(self.sink.timeout_secs),
        })
    }

    pub fn session_timing(&self) -> SessionTiming {
        SessionTiming {
            retry_delay: Duration::from_secs(self.session.retry_delay_secs),
            recv_error_cooldown: Duration::from_secs(self.session.recv_error_cooldown_secs),
            stats_interval: Duration::from_secs(self.session.stats_interval_secs),
            connect_timeout: Duration::from_secs(self.session.connect_timeout_secs),
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "ocstream", "ocstream")
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("ocstream");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

pub fn default_store_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("devices.json"),
        |dirs| dirs.data_dir().join("devices.json"),
    )
}

// ── Loading / saving ────────────────────────────────────────────────

/// The provider stack without extraction, for `config show`.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(CollectorConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("OCSTREAM_").split("__"))
}

/// Load and validate the configuration. `None` uses [`config_path`].
pub fn load_config(path: Option<&Path>) -> Result<CollectorConfig, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    let config: CollectorConfig = figment(&path).extract()?;
    config.validate()?;
    Ok(config)
}

/// Write `cfg` as pretty TOML, creating parent directories.
pub fn save_config(cfg: &CollectorConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
