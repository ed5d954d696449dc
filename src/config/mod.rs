//! Configuration management.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables of the form `REFERENCE_ASSISTANT__SECTION__KEY`
//! (e.g. `REFERENCE_ASSISTANT__SEARCH__MAX_WORKERS=2`).

mod file_config;

pub use file_config::{find_config_file, ConfigFileError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::{CircuitBreakerConfig, ControllerConfig, RetryConfig};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "REFERENCE_ASSISTANT";

const APP_DIR: &str = "reference-assistant";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub cache: CacheConfig,
    pub controller: ControllerConfig,
    pub breaker: BreakerConfig,
    pub retry: RetryConfig,
    pub api_keys: ApiKeys,
    pub sources: SourcesConfig,
    pub source_rates: Vec<SourceRateConfig>,
    pub logging: LoggingConfig,
}

impl Config {
    /// Requests per second configured for a provider, if any
    pub fn rate_for(&self, source: &str) -> Option<f64> {
        self.source_rates
            .iter()
            .find(|r| r.source == source)
            .map(|r| r.requests_per_second)
    }
}

/// Fan-out settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Per-provider task timeout
    pub task_timeout_secs: f64,
    /// Deadline for the whole fan-out
    pub dispatch_timeout_secs: f64,
    /// Provider tasks allowed to run at once
    pub max_workers: usize,
    /// Results requested from each provider when no limit is given
    pub default_limit: usize,
    /// Works requested from each provider for an author search
    pub author_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            task_timeout_secs: 15.0,
            dispatch_timeout_secs: 15.0,
            max_workers: 3,
            default_limit: 5,
            author_limit: 20,
        }
    }
}

impl SearchConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.task_timeout_secs.max(0.0))
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.dispatch_timeout_secs.max(0.0))
    }
}

/// Result cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Cache file; defaults to the platform cache directory
    pub path: Option<PathBuf>,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            ttl_seconds: 7 * 24 * 60 * 60,
        }
    }
}

/// Circuit breaker settings shared by every provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        let defaults = CircuitBreakerConfig::default();
        Self {
            failure_threshold: defaults.failure_threshold,
            recovery_timeout_secs: defaults.recovery_timeout.as_secs(),
        }
    }
}

impl From<&BreakerConfig> for CircuitBreakerConfig {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            recovery_timeout: Duration::from_secs(config.recovery_timeout_secs),
        }
    }
}

/// API keys and contact details for external services
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    /// Contact address sent to CrossRef's polite pool
    pub crossref_mailto: Option<String>,
    pub google_books: Option<String>,
    /// NCBI key; raises the PubMed request allowance
    pub ncbi: Option<String>,
}

/// Provider selection and endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Comma-separated provider ids to use exclusively
    pub enabled: Option<String>,
    /// Comma-separated provider ids never to use
    pub disabled: Option<String>,
    pub crossref_url: Option<String>,
    pub pubmed_url: Option<String>,
    pub google_books_url: Option<String>,
}

impl SourcesConfig {
    /// Whether a provider id passes the enabled/disabled lists
    pub fn is_enabled(&self, id: &str) -> bool {
        if split_list(self.disabled.as_deref()).any(|s| s == id) {
            return false;
        }
        let mut enabled = split_list(self.enabled.as_deref()).peekable();
        enabled.peek().is_none() || enabled.any(|s| s == id)
    }
}

fn split_list(list: Option<&str>) -> impl Iterator<Item = &str> {
    list.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Per-provider client-side rate limit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRateConfig {
    pub source: String,
    pub requests_per_second: f64,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `"json"` for structured output, anything else for plain text
    pub format: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: None,
        }
    }
}

/// Load configuration from defaults, an optional file and the environment
///
/// An explicit `path` must exist; without one the platform config file is
/// used when present.
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();

    match path {
        Some(path) => {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        None => {
            if let Some(found) = find_config_file() {
                builder = builder.add_source(config::File::from(found).required(false));
            }
        }
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}

/// Platform config file location (`<config_dir>/reference-assistant/config.toml`)
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

/// Platform cache file location, falling back to the temp directory
pub fn default_cache_file() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join("results.json")
}
