//! Configuration management for the reverse DCF service.
//!
//! The service reads a single configuration file at `~/.reverse-dcf/config.json`.
//! Every section is optional; missing fields fall back to defaults.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (RDCF_* prefix), when loaded via [`Config::load_with_env`]
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `RDCF_PORT` → service.port
//! - `RDCF_BIND_ADDRESS` → network.bind
//! - `RDCF_LOG_LEVEL` → observability.log_level
//! - `RDCF_LOG_FORMAT` → observability.log_format
//! - `RDCF_MARKET_DATA_URL` → market_data.base_url

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".reverse-dcf"),
        |dirs| dirs.home_dir().join(".reverse-dcf"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Network / Service Configuration
// ============================================================================

/// Global network configuration.
///
/// Default bind address is `127.0.0.1` (local only).
/// Set to `0.0.0.0` to allow remote access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_address")]
    pub bind: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

/// HTTP service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceConfig {
    /// Port number for the valuation service
    #[serde(default)]
    pub port: Option<u16>,
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to pin at `warn`.
    ///
    /// The built-in noisy modules (hyper, reqwest, h2, rustls, ...) are
    /// always filtered; this list adds to them.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Valuation Defaults
// ============================================================================

/// When the terminal value is considered realized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalDiscounting {
    /// Discount with the last fade year's factor (value realized at the horizon).
    #[default]
    AtHorizon,
    /// Discount one additional period beyond the last fade year.
    OnePeriodLater,
}

/// Upper bound on explicit growth years plus fade years.
pub const MAX_HORIZON_YEARS: u32 = 200;

/// Default valuation parameters, expressed the way a user enters them
/// (percentages, not fractions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationDefaultsConfig {
    #[serde(default = "default_cost_of_capital_pct")]
    pub cost_of_capital_pct: f64,

    #[serde(default = "default_pre_tax_roce_pct")]
    pub pre_tax_roce_pct: f64,

    #[serde(default = "default_explicit_growth_pct")]
    pub explicit_growth_pct: f64,

    #[serde(default = "default_explicit_growth_years")]
    pub explicit_growth_years: u32,

    #[serde(default = "default_fade_period_years")]
    pub fade_period_years: u32,

    #[serde(default = "default_terminal_growth_pct")]
    pub terminal_growth_pct: f64,

    /// Round each explicit-phase discounted cash flow to cents before summing.
    #[serde(default = "default_true")]
    pub round_explicit_cash_flows: bool,

    #[serde(default)]
    pub terminal_discounting: TerminalDiscounting,
}

impl Default for ValuationDefaultsConfig {
    fn default() -> Self {
        Self {
            cost_of_capital_pct: default_cost_of_capital_pct(),
            pre_tax_roce_pct: default_pre_tax_roce_pct(),
            explicit_growth_pct: default_explicit_growth_pct(),
            explicit_growth_years: default_explicit_growth_years(),
            fade_period_years: default_fade_period_years(),
            terminal_growth_pct: default_terminal_growth_pct(),
            round_explicit_cash_flows: true,
            terminal_discounting: TerminalDiscounting::default(),
        }
    }
}

fn default_cost_of_capital_pct() -> f64 {
    12.0
}
fn default_pre_tax_roce_pct() -> f64 {
    20.0
}
fn default_explicit_growth_pct() -> f64 {
    12.0
}
fn default_explicit_growth_years() -> u32 {
    15
}
fn default_fade_period_years() -> u32 {
    15
}
fn default_terminal_growth_pct() -> f64 {
    5.0
}
fn default_true() -> bool {
    true
}

// ============================================================================
// Market Data Configuration
// ============================================================================

/// Market data source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataConfig {
    /// Base URL of the company fundamentals site
    #[serde(default = "default_market_data_url")]
    pub base_url: String,

    /// Per-request timeout
    #[serde(default = "default_market_data_timeout")]
    pub timeout_secs: u64,

    /// Retries for recoverable failures (network, rate limiting)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff between retries, multiplied by the attempt number
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Fetch consolidated statements first, standalone as fallback
    #[serde(default = "default_true")]
    pub prefer_consolidated: bool,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: default_market_data_url(),
            timeout_secs: default_market_data_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            user_agent: default_user_agent(),
            prefer_consolidated: true,
        }
    }
}

fn default_market_data_url() -> String {
    "https://www.screener.in".into()
}
fn default_market_data_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    500
}
fn default_user_agent() -> String {
    format!("reverse-dcf/{}", env!("CARGO_PKG_VERSION"))
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Default valuation parameters and engine conventions
    #[serde(default)]
    pub valuation: ValuationDefaultsConfig,

    #[serde(default)]
    pub market_data: MarketDataConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Runs before logging is initialized, so a malformed value is an error
    /// rather than a log line.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("RDCF_PORT") {
            let port = port
                .parse::<u16>()
                .with_context(|| format!("Invalid RDCF_PORT: {:?}", port))?;
            self.service.port = Some(port);
        }

        if let Ok(bind) = std::env::var("RDCF_BIND_ADDRESS") {
            self.network.bind = bind;
        }

        if let Ok(level) = std::env::var("RDCF_LOG_LEVEL") {
            self.observability.log_level = level;
        }

        if let Ok(format) = std::env::var("RDCF_LOG_FORMAT") {
            self.observability.log_format = format;
        }

        if let Ok(url) = std::env::var("RDCF_MARKET_DATA_URL") {
            self.market_data.base_url = url;
        }

        Ok(())
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    /// Save configuration to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).with_context(|| {
                    format!("Failed to create config directory {}", dir.display())
                })?;
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Get the effective bind address.
    pub fn bind_address(&self) -> &str {
        &self.network.bind
    }

    /// Get the valuation service port.
    pub fn service_port(&self) -> u16 {
        self.service.port.unwrap_or_else(default_service_port)
    }

    /// Get the valuation service endpoint URL.
    pub fn service_endpoint(&self) -> String {
        format!("http://{}:{}", self.bind_address(), self.service_port())
    }
}

fn default_service_port() -> u16 {
    4440
}
