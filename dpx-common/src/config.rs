//! Configuration loading and validation
//!
//! Two concerns live here:
//! 1. **Discovery**: which TOML file to read (CLI → ENV → user config dir → working dir)
//! 2. **Resolution**: parse the TOML, fill secrets from the environment, load the
//!    roster, and validate everything before any network activity happens.
//!
//! A [`Settings`] value is immutable once built and is handed to the pipeline.

use crate::roster::{self, Partition};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "DPX_CONFIG";
/// Environment variable overriding the remote API password
pub const API_PASSWORD_ENV_VAR: &str = "DPX_API_PASSWORD";
/// Environment variable overriding the submission endpoint password
pub const SUBMIT_PASSWORD_ENV_VAR: &str = "DPX_SUBMIT_PASSWORD";

const CONFIG_FILE_NAME: &str = "dpx.toml";

/// Bootstrap configuration as it appears in the TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding one subfolder per partition
    pub output_root: PathBuf,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Remote collection API
    pub api: ApiConfig,

    /// Downstream submission endpoint
    pub submission: SubmissionConfig,

    /// Concurrency ceilings per pipeline stage
    #[serde(default)]
    pub pools: PoolConfig,

    /// Sales orders to leave out, per partition
    #[serde(default)]
    pub exclusions: ExclusionConfig,

    /// Extract file naming
    #[serde(default)]
    pub extract: ExtractConfig,

    /// CSV export of the partition spreadsheet (relative paths resolve against the config file)
    #[serde(default)]
    pub roster_file: Option<PathBuf>,

    /// Inline roster rows
    #[serde(default)]
    pub partitions: Vec<Partition>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Durable log file (defaults to `{output_root}/dpx.log`)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Remote collection API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Additional attempts after the first, per collection read
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay unit; attempt `n` waits `base_delay_ms * n`
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    pub endpoints: EndpointConfig,
}

/// Collection paths, relative to `base_url`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointConfig {
    #[serde(default)]
    pub sales_orders: String,
    #[serde(default)]
    pub sales_order_items: String,
    #[serde(default)]
    pub accounting_items: String,
    #[serde(default)]
    pub billing_documents: String,
    #[serde(default)]
    pub billing_accounting_xref: String,
    #[serde(default)]
    pub flags: String,
}

impl EndpointConfig {
    fn named(&self) -> [(&'static str, &str); 6] {
        [
            ("sales_orders", &self.sales_orders),
            ("sales_order_items", &self.sales_order_items),
            ("accounting_items", &self.accounting_items),
            ("billing_documents", &self.billing_documents),
            ("billing_accounting_xref", &self.billing_accounting_xref),
            ("flags", &self.flags),
        ]
    }
}

/// Downstream submission endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionConfig {
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Additional attempts after the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay unit; attempt `n` waits `base_delay_ms * n`
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl SubmissionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Concurrency ceilings
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_pool_size")]
    pub sales_order_items: usize,
    #[serde(default = "default_pool_size")]
    pub accounting_documents: usize,
    #[serde(default = "default_pool_size")]
    pub flags: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            sales_order_items: default_pool_size(),
            accounting_documents: default_pool_size(),
            flags: default_pool_size(),
        }
    }
}

/// Per-partition exclusion lists
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExclusionConfig {
    /// Partition code → sales order identifiers
    #[serde(default)]
    pub sales_orders: HashMap<String, Vec<String>>,
}

impl ExclusionConfig {
    /// Sales orders excluded for one partition
    pub fn for_partition(&self, partition_code: &str) -> &[String] {
        self.sales_orders
            .get(partition_code)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Extract file naming
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractConfig {
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            file_prefix: default_file_prefix(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("dpx-sync/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_pool_size() -> usize {
    12
}

fn default_file_prefix() -> String {
    "DownPaymentExtract".to_string()
}

/// Validated, immutable run settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub output_root: PathBuf,
    pub logging: LoggingConfig,
    pub api: ApiConfig,
    pub submission: SubmissionConfig,
    pub pools: PoolConfig,
    pub exclusions: ExclusionConfig,
    pub extract: ExtractConfig,
    pub partitions: Vec<Partition>,
}

impl Settings {
    /// Read, resolve and validate the config file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read config {} failed: {}", path.display(), e)))?;
        let toml_config: TomlConfig = toml::from_str(&content)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml(toml_config, base_dir)
    }

    /// Resolve secrets and the roster, then validate
    ///
    /// `base_dir` anchors a relative `roster_file`.
    pub fn from_toml(mut config: TomlConfig, base_dir: &Path) -> Result<Self> {
        config.api.password = resolve_secret(API_PASSWORD_ENV_VAR, &config.api.password);
        config.submission.password =
            resolve_secret(SUBMIT_PASSWORD_ENV_VAR, &config.submission.password);

        let mut partitions = config.partitions;
        if let Some(roster_file) = &config.roster_file {
            let roster_path = if roster_file.is_absolute() {
                roster_file.clone()
            } else {
                base_dir.join(roster_file)
            };
            let from_file = roster::load_roster_csv(&roster_path)?;
            info!(
                path = %roster_path.display(),
                partitions = from_file.len(),
                "Partition roster loaded"
            );
            partitions.extend(from_file);
        }

        let settings = Self {
            output_root: config.output_root,
            logging: config.logging,
            api: config.api,
            submission: config.submission,
            pools: config.pools,
            exclusions: config.exclusions,
            extract: config.extract,
            partitions,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Fatal checks performed before the first request
    pub fn validate(&self) -> Result<()> {
        if self.output_root.as_os_str().is_empty() {
            return Err(Error::Config("output_root is required".to_string()));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(Error::Config("api.base_url is required".to_string()));
        }
        for (name, value) in self.api.endpoints.named() {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("api.endpoints.{} is required", name)));
            }
        }
        if self.api.username.trim().is_empty() || self.api.password.is_empty() {
            return Err(Error::Config(format!(
                "api credentials are required (username + password or {})",
                API_PASSWORD_ENV_VAR
            )));
        }
        if self.submission.url.trim().is_empty() {
            return Err(Error::Config("submission.url is required".to_string()));
        }
        if self.submission.username.trim().is_empty() || self.submission.password.is_empty() {
            return Err(Error::Config(format!(
                "submission credentials are required (username + password or {})",
                SUBMIT_PASSWORD_ENV_VAR
            )));
        }
        if self.api.timeout_secs == 0 || self.submission.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be at least 1".to_string()));
        }
        let pools = &self.pools;
        if pools.sales_order_items == 0 || pools.accounting_documents == 0 || pools.flags == 0 {
            return Err(Error::Config("pool ceilings must be at least 1".to_string()));
        }
        if self.extract.file_prefix.trim().is_empty() {
            return Err(Error::Config("extract.file_prefix must not be blank".to_string()));
        }
        roster::validate_roster(&self.partitions)
    }

    /// Sales orders excluded for one partition
    pub fn excluded_sales_orders(&self, partition_code: &str) -> &[String] {
        self.exclusions.for_partition(partition_code)
    }

    /// Durable log file location
    pub fn log_file(&self) -> PathBuf {
        self.logging
            .file
            .clone()
            .unwrap_or_else(|| self.output_root.join("dpx.log"))
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }
}

/// Prefer a non-empty environment value over the TOML value
fn resolve_secret(env_var_name: &str, toml_value: &str) -> String {
    match std::env::var(env_var_name) {
        Ok(value) if !value.is_empty() => {
            if !toml_value.is_empty() {
                warn!(
                    "{} set in both environment and TOML config. Using environment.",
                    env_var_name
                );
            }
            value
        }
        _ => toml_value.to_string(),
    }
}

/// Config file discovery following priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. User config directory (`~/.config/dpx/dpx.toml` on Linux)
/// 4. `dpx.toml` in the working directory (fallback)
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    // Priority 3: User config directory
    if let Some(path) = dirs::config_dir().map(|d| d.join("dpx").join(CONFIG_FILE_NAME)) {
        if path.exists() {
            return Ok(path);
        }
    }

    // Priority 4: Working directory
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Ok(local);
    }

    Err(Error::Config(format!(
        "No config file found. Pass --config, set {}, or create {}",
        env_var_name, CONFIG_FILE_NAME
    )))
}
