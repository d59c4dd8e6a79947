/*!
 * Configuration types for Ferry
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{FerryError, Result};

/// Largest page the source is asked for
pub const MAX_BATCH_SIZE: usize = 1000;

/// Main configuration for a shipping run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FerryConfig {
    /// Directory holding checkpoint files
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Lower bound of the scan window. Changing it resets progress.
    #[serde(default = "default_start_time")]
    pub start_time: DateTime<Utc>,

    /// Optional upper bound of the scan window (default: now at each fetch)
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,

    /// Events requested per page
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Wait between polls when no event is available, in seconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Event namespace to search
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Event types to search for (empty = all types)
    #[serde(default)]
    pub types: Vec<String>,

    /// Log events instead of sending them to the collector
    #[serde(default)]
    pub dry_run: bool,

    /// Stop after this many deliveries (None = run until stopped)
    #[serde(default)]
    pub max_events: Option<u64>,

    /// Extra attempts for transient fetch/send failures (0 = fail immediately)
    #[serde(default)]
    pub retry_attempts: u32,

    /// Retry delay in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Use exponential backoff for retries
    #[serde(default = "default_true")]
    pub exponential_backoff: bool,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,

    /// Audit event source
    #[serde(default)]
    pub source: SourceConfig,

    /// Log collector
    #[serde(default)]
    pub sink: SinkConfig,
}

impl Default for FerryConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            start_time: default_start_time(),
            end_time: None,
            batch_size: default_batch_size(),
            poll_timeout_secs: default_poll_timeout(),
            namespace: default_namespace(),
            types: Vec::new(),
            dry_run: false,
            max_events: None,
            retry_attempts: 0,
            retry_delay_secs: default_retry_delay(),
            exponential_backoff: true,
            log_level: LogLevel::Info,
            log_file: None,
            verbose: false,
            source: SourceConfig::default(),
            sink: SinkConfig::default(),
        }
    }
}

/// Connection settings for the audit event source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the search API
    #[serde(default)]
    pub endpoint: String,

    /// Bearer token
    #[serde(default)]
    pub token: Option<String>,

    /// CA bundle for the source's server certificate
    #[serde(default)]
    pub ca_path: Option<PathBuf>,

    /// Client certificate (PEM)
    #[serde(default)]
    pub cert_path: Option<PathBuf>,

    /// Client private key (PEM)
    #[serde(default)]
    pub key_path: Option<PathBuf>,

    /// Request timeout in seconds
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
}

/// Connection settings for the log collector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Collector URL events are POSTed to
    #[serde(default)]
    pub url: String,

    /// CA bundle for the collector's server certificate
    #[serde(default)]
    pub ca_path: Option<PathBuf>,

    /// Client certificate (PEM)
    #[serde(default)]
    pub cert_path: Option<PathBuf>,

    /// Client private key (PEM)
    #[serde(default)]
    pub key_path: Option<PathBuf>,

    /// Request timeout in seconds
    #[serde(default = "default_sink_timeout")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: None,
            ca_path: None,
            cert_path: None,
            key_path: None,
            timeout_secs: default_source_timeout(),
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            ca_path: None,
            cert_path: None,
            key_path: None,
            timeout_secs: default_sink_timeout(),
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("storage")
}

fn default_start_time() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

fn default_batch_size() -> usize {
    20
}

fn default_poll_timeout() -> u64 {
    5
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_retry_delay() -> u64 {
    1
}

fn default_source_timeout() -> u64 {
    30
}

fn default_sink_timeout() -> u64 {
    10
}

impl FerryConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            FerryError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents)
            .map_err(|e| FerryError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    /// Check the configuration before anything touches the network or disk
    pub fn validate(&self) -> Result<()> {
        if self.storage_dir.as_os_str().is_empty() {
            return Err(FerryError::Config("storage_dir must not be empty".into()));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(FerryError::Config(format!(
                "batch_size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.batch_size
            )));
        }
        if self.poll_timeout_secs == 0 {
            return Err(FerryError::Config(
                "poll_timeout_secs must be at least 1".into(),
            ));
        }
        if self.namespace.trim().is_empty() {
            return Err(FerryError::Config("namespace must not be empty".into()));
        }
        if self.types.iter().any(|t| t.trim().is_empty()) {
            return Err(FerryError::Config("types must not contain empty entries".into()));
        }
        if let Some(end) = self.end_time {
            if end <= self.start_time {
                return Err(FerryError::Config(format!(
                    "end_time {} must be after start_time {}",
                    end.to_rfc3339(),
                    self.start_time.to_rfc3339()
                )));
            }
        }
        if self.max_events == Some(0) {
            return Err(FerryError::Config("max_events must be at least 1".into()));
        }

        validate_url("source.endpoint", &self.source.endpoint)?;
        validate_identity(
            "source",
            self.source.cert_path.as_ref(),
            self.source.key_path.as_ref(),
        )?;
        if self.source.timeout_secs == 0 {
            return Err(FerryError::Config("source.timeout_secs must be at least 1".into()));
        }

        if !self.dry_run {
            validate_url("sink.url", &self.sink.url)?;
            validate_identity(
                "sink",
                self.sink.cert_path.as_ref(),
                self.sink.key_path.as_ref(),
            )?;
            if self.sink.cert_path.is_none() {
                return Err(FerryError::Config(
                    "sink.cert_path and sink.key_path are required (mutual TLS) unless dry_run is set"
                        .into(),
                ));
            }
            if self.sink.timeout_secs == 0 {
                return Err(FerryError::Config("sink.timeout_secs must be at least 1".into()));
            }
        }

        Ok(())
    }
}

fn validate_url(field: &str, value: &str) -> Result<Url> {
    if value.trim().is_empty() {
        return Err(FerryError::Config(format!("{} is required", field)));
    }
    let url = Url::parse(value)
        .map_err(|e| FerryError::Config(format!("{} is not a valid URL: {}", field, e)))?;
    match url.scheme() {
        "https" | "http" => Ok(url),
        other => Err(FerryError::Config(format!(
            "{} must use http or https, got {}",
            field, other
        ))),
    }
}

fn validate_identity(section: &str, cert: Option<&PathBuf>, key: Option<&PathBuf>) -> Result<()> {
    match (cert, key) {
        (Some(_), None) | (None, Some(_)) => Err(FerryError::Config(format!(
            "{section}.cert_path and {section}.key_path must be set together"
        ))),
        _ => Ok(()),
    }
}
