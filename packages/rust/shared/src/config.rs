//! Application configuration for geofill.
//!
//! User config lives at `~/.geofill/geofill.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GeofillError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "geofill.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".geofill";

// ---------------------------------------------------------------------------
// Config structs (matching geofill.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Geocoding provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Rate limit on provider calls.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Transport failure policy.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Emit a progress observation every this many records seen.
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,

    /// Flush the result store after this many newly stored entries.
    #[serde(default = "default_flush_every")]
    pub flush_every: usize,

    /// Output file used when the CLI is not told otherwise.
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            progress_every: default_progress_every(),
            flush_every: default_flush_every(),
            output: default_output(),
        }
    }
}

fn default_progress_every() -> usize {
    100
}
fn default_flush_every() -> usize {
    50
}
fn default_output() -> String {
    "locations.json".into()
}

/// `[provider]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Geocoding endpoint, queried with `key` and `address` parameters.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    "https://maps.googleapis.com/maps/api/geocode/json".into()
}
fn default_api_key_env() -> String {
    "GEOCODE_API_KEY".into()
}
fn default_timeout_secs() -> u64 {
    10
}

/// `[rate_limit]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum lookups started within one window.
    #[serde(default = "default_max_calls")]
    pub max_calls: u32,

    /// Window length in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: default_max_calls(),
            window_ms: default_window_ms(),
        }
    }
}

fn default_max_calls() -> u32 {
    5
}
fn default_window_ms() -> u64 {
    1000
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// What to do when a lookup fails at the transport level.
    #[serde(default)]
    pub on_network_error: NetworkErrorPolicy,

    /// Backoff before the single retry, in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            on_network_error: NetworkErrorPolicy::default(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_backoff_ms() -> u64 {
    500
}

/// Policy applied when a provider lookup fails at the transport level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkErrorPolicy {
    /// Retry once after a backoff, then store an unresolved entry and move on.
    #[default]
    Retry,
    /// Flush what exists and abort the run, surfacing the error.
    Abort,
}

impl FromStr for NetworkErrorPolicy {
    type Err = GeofillError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "retry" => Ok(Self::Retry),
            "abort" => Ok(Self::Abort),
            other => Err(GeofillError::config(format!(
                "unknown network error policy '{other}' (expected 'retry' or 'abort')"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Enrichment config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime enrichment configuration, merged from config file and CLI flags.
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Provider endpoint URL.
    pub endpoint: String,
    /// Name of the env var holding the API key.
    pub api_key_env: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum lookups started within one rate window.
    pub max_calls: u32,
    /// Rate window length in milliseconds.
    pub window_ms: u64,
    /// Transport failure policy.
    pub on_network_error: NetworkErrorPolicy,
    /// Backoff before the single retry, in milliseconds.
    pub backoff_ms: u64,
    /// Progress observation interval, in records seen.
    pub progress_every: usize,
    /// Incremental flush interval, in newly stored entries.
    pub flush_every: usize,
}

impl From<&AppConfig> for EnrichmentConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            endpoint: config.provider.endpoint.clone(),
            api_key_env: config.provider.api_key_env.clone(),
            timeout_secs: config.provider.timeout_secs,
            max_calls: config.rate_limit.max_calls,
            window_ms: config.rate_limit.window_ms,
            on_network_error: config.retry.on_network_error,
            backoff_ms: config.retry.backoff_ms,
            progress_every: config.defaults.progress_every,
            flush_every: config.defaults.flush_every,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.geofill/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| GeofillError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.geofill/geofill.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| GeofillError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| GeofillError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| GeofillError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| GeofillError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| GeofillError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the provider API key from the configured environment variable.
/// Checked before any lookup so a run never starts without a credential.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.provider.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(GeofillError::config(format!(
            "geocoding API key not found. Set the {var_name} environment variable."
        ))),
    }
}
