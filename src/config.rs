//! Router configuration.

use crate::router::RouterOptions;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main router configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Shard and command settings.
    #[serde(default)]
    pub router: RouterConfig,

    /// Stats window and reporting.
    #[serde(default)]
    pub stats: StatsConfig,

    /// Main context thread.
    #[serde(default)]
    pub main_context: MainContextConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Shutdown configuration.
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the number of shards.
    pub fn shards(&self) -> usize {
        self.router.shards.unwrap_or_else(num_cpus::get)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shards() == 0 {
            return Err(ConfigError::Invalid("router.shards must be at least 1".into()));
        }
        let bin = self.stats.bin_duration_secs;
        let window = self.stats.window_secs;
        if bin == 0 {
            return Err(ConfigError::Invalid(
                "stats.bin_duration_secs must be at least 1".into(),
            ));
        }
        if window == 0 || window % bin != 0 {
            return Err(ConfigError::Invalid(format!(
                "stats.window_secs ({}) must be a positive multiple of stats.bin_duration_secs ({})",
                window, bin
            )));
        }
        if self.main_context.stack_size < MainContextConfig::MIN_STACK_SIZE {
            return Err(ConfigError::Invalid(format!(
                "main_context.stack_size must be at least {} bytes",
                MainContextConfig::MIN_STACK_SIZE
            )));
        }
        Ok(())
    }

    /// Runtime options for the router.
    pub fn router_options(&self) -> RouterOptions {
        RouterOptions {
            num_shards: self.shards(),
            enable_flush_cmd: self.router.enable_flush_cmd,
            bin_duration: Duration::from_secs(self.stats.bin_duration_secs),
            num_bins: (self.stats.window_secs / self.stats.bin_duration_secs.max(1)) as usize,
        }
    }
}

/// Shard and command configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouterConfig {
    /// Number of shards. Defaults to number of CPUs.
    pub shards: Option<usize>,

    /// Forward `flush_all` instead of rejecting it.
    #[serde(default)]
    pub enable_flush_cmd: bool,
}

/// Stats window configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    /// Length of one bin in seconds.
    #[serde(default = "StatsConfig::default_bin_duration_secs")]
    pub bin_duration_secs: u64,

    /// Length of the rate window in seconds.
    #[serde(default = "StatsConfig::default_window_secs")]
    pub window_secs: u64,

    /// How often the default report is logged, in seconds. 0 disables it.
    #[serde(default = "StatsConfig::default_report_interval_secs")]
    pub report_interval_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            bin_duration_secs: Self::default_bin_duration_secs(),
            window_secs: Self::default_window_secs(),
            report_interval_secs: Self::default_report_interval_secs(),
        }
    }
}

impl StatsConfig {
    fn default_bin_duration_secs() -> u64 {
        1
    }

    fn default_window_secs() -> u64 {
        60
    }

    fn default_report_interval_secs() -> u64 {
        60
    }
}

/// Main context configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MainContextConfig {
    /// Stack size of the main context thread in bytes.
    #[serde(default = "MainContextConfig::default_stack_size")]
    pub stack_size: usize,
}

impl Default for MainContextConfig {
    fn default() -> Self {
        Self {
            stack_size: Self::default_stack_size(),
        }
    }
}

impl MainContextConfig {
    const MIN_STACK_SIZE: usize = 16 * 1024;

    fn default_stack_size() -> usize {
        256 * 1024 // 256KB
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human readable output (default).
    #[default]
    Pretty,
    /// Single-line human readable output.
    Compact,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Log format: "pretty", "json", or "compact".
    #[serde(default)]
    pub format: LogFormat,

    /// Include timestamps.
    #[serde(default = "LoggingConfig::default_true")]
    pub timestamps: bool,

    /// Include the event target (module path).
    #[serde(default = "LoggingConfig::default_true")]
    pub target: bool,

    /// Include thread names.
    #[serde(default = "LoggingConfig::default_true")]
    pub thread_names: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            format: LogFormat::default(),
            timestamps: true,
            target: true,
            thread_names: true,
        }
    }
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }

    fn default_true() -> bool {
        true
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownConfig {
    /// Drain timeout in seconds.
    #[serde(default = "ShutdownConfig::default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: Self::default_drain_timeout_secs(),
        }
    }
}

impl ShutdownConfig {
    fn default_drain_timeout_secs() -> u64 {
        30
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.stats.bin_duration_secs, 1);
        assert_eq!(config.stats.window_secs, 60);
        assert_eq!(config.main_context.stack_size, 256 * 1024);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(!config.router.enable_flush_cmd);
        assert_eq!(config.shards(), num_cpus::get());
    }

    #[test]
    fn test_router_options() {
        let config = Config::parse(
            r#"
            [router]
            shards = 4
            enable_flush_cmd = true

            [stats]
            bin_duration_secs = 5
            window_secs = 120
            "#,
        )
        .unwrap();
        let opts = config.router_options();
        assert_eq!(opts.num_shards, 4);
        assert!(opts.enable_flush_cmd);
        assert_eq!(opts.bin_duration, Duration::from_secs(5));
        assert_eq!(opts.num_bins, 24);
    }

    #[test]
    fn test_rejects_bad_window() {
        let err = Config::parse("[stats]\nbin_duration_secs = 7\nwindow_secs = 60\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = Config::parse("[router]\nshards = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = Config::parse("[stats]\nwindow_secs = \"soon\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nformat = \"json\"\nlevel = \"debug\"").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "debug");

        let missing = file.path().with_extension("missing");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io(_))));
    }
}
