//! Configuration module for drivepull.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for drivepull.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub transfer: TransferConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Read-only source API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL of the attribute/listing API.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Destination cloud filesystem settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    /// Base URL of the destination REST API.
    pub base_url: String,
    /// Identifier of the destination filesystem root.
    pub root_id: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Transfer / worker pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Number of concurrently executing tasks.
    pub max_workers: usize,
    /// Negative: selective retries; 0: never retry; n > 0: retry any error up to n times.
    pub max_retries: i64,
    /// Ceiling for direct uploads in bytes. Absent: always allowed; negative: never.
    pub direct_upload_max_size: Option<i64>,
    /// Merge the source root's children straight into the target directory.
    pub no_root: bool,
    /// Serialize guarded destination calls (create/list/attr).
    pub lock_dir_methods: bool,
    /// Seconds between progress reports; 0 disables them.
    pub stats_interval_secs: u64,
}

/// Destination authentication settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Credentials file. `None` lets the CLI look for the default file.
    pub credentials_path: Option<PathBuf>,
    /// Device kind requested when reauthenticating.
    pub device_kind: String,
    /// How often one guarded call may trigger reauthentication before giving up.
    pub max_reauth_rounds: u32,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/drivepull/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("drivepull")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            root_id: "0".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_workers: 1,
            max_retries: -1,
            direct_upload_max_size: None,
            no_root: false,
            lock_dir_methods: false,
            stats_interval_secs: 30,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_path: None,
            device_kind: "desktop".to_string(),
            max_reauth_rounds: 3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"transfer.max_workers"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn check_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        errors.push(ValidationError {
            field: field.into(),
            message: format!("must be an http(s) URL, got {value:?}"),
        });
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- source ---
        check_url(&mut errors, "source.base_url", &self.source.base_url);
        if self.source.timeout_secs == 0 {
            errors.push(ValidationError {
                field: "source.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- destination ---
        check_url(
            &mut errors,
            "destination.base_url",
            &self.destination.base_url,
        );
        if self.destination.root_id.trim().is_empty() {
            errors.push(ValidationError {
                field: "destination.root_id".into(),
                message: "must not be empty".into(),
            });
        }
        if self.destination.timeout_secs == 0 {
            errors.push(ValidationError {
                field: "destination.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- transfer ---
        if self.transfer.max_workers == 0 {
            errors.push(ValidationError {
                field: "transfer.max_workers".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- auth ---
        if self.auth.device_kind.trim().is_empty() {
            errors.push(ValidationError {
                field: "auth.device_kind".into(),
                message: "must not be empty".into(),
            });
        }
        if self.auth.max_reauth_rounds == 0 {
            errors.push(ValidationError {
                field: "auth.max_reauth_rounds".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid log level '{}'; expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and lets callers override individual
/// fields before calling [`ConfigBuilder::build`].
///
/// # Example
///
/// ```
/// use drivepull_core::config::ConfigBuilder;
///
/// let cfg = ConfigBuilder::new()
///     .max_workers(8)
///     .no_root(true)
///     .build();
/// assert_eq!(cfg.transfer.max_workers, 8);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Start from an existing configuration, e.g. one loaded from disk.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    // --- source ---

    pub fn source_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.source.base_url = url.into();
        self
    }

    pub fn source_timeout_secs(mut self, secs: u64) -> Self {
        self.config.source.timeout_secs = secs;
        self
    }

    // --- destination ---

    pub fn destination_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.destination.base_url = url.into();
        self
    }

    pub fn destination_root_id(mut self, id: impl Into<String>) -> Self {
        self.config.destination.root_id = id.into();
        self
    }

    // --- transfer ---

    pub fn max_workers(mut self, n: usize) -> Self {
        self.config.transfer.max_workers = n;
        self
    }

    pub fn max_retries(mut self, n: i64) -> Self {
        self.config.transfer.max_retries = n;
        self
    }

    pub fn direct_upload_max_size(mut self, limit: Option<i64>) -> Self {
        self.config.transfer.direct_upload_max_size = limit;
        self
    }

    pub fn no_root(mut self, no_root: bool) -> Self {
        self.config.transfer.no_root = no_root;
        self
    }

    pub fn lock_dir_methods(mut self, lock: bool) -> Self {
        self.config.transfer.lock_dir_methods = lock;
        self
    }

    pub fn stats_interval_secs(mut self, secs: u64) -> Self {
        self.config.transfer.stats_interval_secs = secs;
        self
    }

    // --- auth ---

    pub fn credentials_path(mut self, path: PathBuf) -> Self {
        self.config.auth.credentials_path = Some(path);
        self
    }

    pub fn device_kind(mut self, kind: impl Into<String>) -> Self {
        self.config.auth.device_kind = kind.into();
        self
    }

    pub fn max_reauth_rounds(mut self, n: u32) -> Self {
        self.config.auth.max_reauth_rounds = n;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
