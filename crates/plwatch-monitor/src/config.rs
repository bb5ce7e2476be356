//! Application configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use plwatch_core::ContextKey;
use plwatch_engine::DEFAULT_CONTRACT_MULTIPLIER;
use plwatch_notify::NotifyPolicy;
use plwatch_telemetry::DEFAULT_LOG_FILTER;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Used when neither `--config` nor `PLWATCH_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Scheduling and computation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Tick period (ms). Default: 10,000.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Scale applied to the summed legs. Default: 100.
    #[serde(default = "default_contract_multiplier")]
    pub contract_multiplier: u32,
    /// When the alert gate re-arms. Default: `rearm_on_loss`.
    #[serde(default)]
    pub notify_policy: NotifyPolicy,
}

fn default_interval_ms() -> u64 {
    10_000
}

fn default_contract_multiplier() -> u32 {
    DEFAULT_CONTRACT_MULTIPLIER
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            contract_multiplier: default_contract_multiplier(),
            notify_policy: NotifyPolicy::default(),
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Where tracked positions are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/positions")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Where current values are read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// One `<encoded context>.json` snapshot per context.
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("data/quotes")
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

impl SourceConfig {
    /// Snapshot file for one context.
    pub fn snapshot_path(&self, context: &ContextKey) -> PathBuf {
        self.snapshot_dir
            .join(format!("{}.json", context.file_stem()))
    }
}

/// Tick journal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_journal_enabled")]
    pub enabled: bool,
    #[serde(default = "default_journal_dir")]
    pub dir: PathBuf,
    /// Records buffered before a flush. Default: 1 (flush every tick).
    #[serde(default = "default_journal_buffer_size")]
    pub buffer_size: usize,
}

fn default_journal_enabled() -> bool {
    true
}

fn default_journal_dir() -> PathBuf {
    PathBuf::from("data/journal")
}

fn default_journal_buffer_size() -> usize {
    1
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: default_journal_enabled(),
            dir: default_journal_dir(),
            buffer_size: default_journal_buffer_size(),
        }
    }
}

/// Output history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Lines kept per context, newest first. Default: 500.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_history_capacity() -> usize {
    500
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
        }
    }
}

/// Alert delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Answer to the startup permission request. Default: true.
    #[serde(default = "default_alerts_enabled")]
    pub enabled: bool,
    /// Read `ack`/`dismiss` commands from stdin. Default: true.
    #[serde(default = "default_console_ack")]
    pub console_ack: bool,
}

fn default_alerts_enabled() -> bool {
    true
}

fn default_console_ack() -> bool {
    true
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: default_alerts_enabled(),
            console_ack: default_console_ack(),
        }
    }
}

/// Logging and statistics settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Period of the statistics summary (seconds). Default: 3600.
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
    /// Write the Prometheus text exposition here on shutdown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_path: Option<PathBuf>,
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

fn default_stats_interval_secs() -> u64 {
    3600
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            stats_interval_secs: default_stats_interval_secs(),
            metrics_path: None,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Context keys monitored by `plwatch run`.
    #[serde(default)]
    pub contexts: Vec<String>,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Resolve the config path: explicit > `PLWATCH_CONFIG` > default.
    pub fn resolve_path(explicit: Option<String>) -> String {
        explicit
            .or_else(|| std::env::var("PLWATCH_CONFIG").ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Load from `path`, falling back to defaults if it does not exist.
    pub fn load(path: &str) -> AppResult<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.monitor.interval_ms == 0 {
            return Err(AppError::Config("monitor.interval_ms must be > 0".to_string()));
        }
        if self.monitor.contract_multiplier == 0 {
            return Err(AppError::Config(
                "monitor.contract_multiplier must be >= 1".to_string(),
            ));
        }
        if self.journal.buffer_size == 0 {
            return Err(AppError::Config("journal.buffer_size must be >= 1".to_string()));
        }
        if self.output.history_capacity == 0 {
            return Err(AppError::Config(
                "output.history_capacity must be >= 1".to_string(),
            ));
        }
        self.context_keys()?;
        Ok(())
    }

    /// Configured contexts, validated and deduplicated in order.
    pub fn context_keys(&self) -> AppResult<Vec<ContextKey>> {
        let mut keys: Vec<ContextKey> = Vec::with_capacity(self.contexts.len());
        for raw in &self.contexts {
            let key = ContextKey::new(raw.as_str())?;
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
