//! Application configuration for ResearchKit.
//!
//! User config lives at `~/.researchkit/researchkit.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ResearchKitError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "researchkit.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".researchkit";

// ---------------------------------------------------------------------------
// Config structs (matching researchkit.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model backend settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Retry/backoff policy for model calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// URL relevance selection.
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Page scraping.
    #[serde(default)]
    pub scrape: ScrapeConfig,
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible server (Ollama, LiteLLM, hosted API).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-call timeout. This is the only way to abort an in-flight call.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured env var, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "gemma2:2b".into()
}
fn default_api_key_env() -> String {
    "RESEARCHKIT_API_KEY".into()
}
fn default_llm_timeout() -> u64 {
    120
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts per invocation (at least 1).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Growth factor applied per attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1_000
}
fn default_backoff_multiplier() -> f64 {
    1.5
}

/// `[selection]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Minimum score (0-10 by prompt convention) for a URL to be kept.
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f64,

    /// Require the model to score exactly the candidate set.
    #[serde(default = "default_true")]
    pub strict_coverage: bool,

    /// Prompt/parse/validate cycles before giving up.
    #[serde(default = "default_max_round_trips")]
    pub max_round_trips: u32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: default_relevance_threshold(),
            strict_coverage: true,
            max_round_trips: default_max_round_trips(),
        }
    }
}

fn default_relevance_threshold() -> f64 {
    6.0
}
fn default_true() -> bool {
    true
}
fn default_max_round_trips() -> u32 {
    3
}

/// `[scrape]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Timeout for a single page fetch.
    #[serde(default = "default_scrape_timeout")]
    pub timeout_secs: u64,

    /// Pages larger than this are rejected.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_scrape_timeout(),
            max_bytes: default_max_bytes(),
        }
    }
}

fn default_scrape_timeout() -> u64 {
    30
}
fn default_max_bytes() -> u64 {
    5 * 1024 * 1024
}

impl AppConfig {
    /// Reject values the engine and selector cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.llm.model.trim().is_empty() {
            return Err(ResearchKitError::config("llm.model must not be empty"));
        }
        Url::parse(&self.llm.base_url).map_err(|e| {
            ResearchKitError::config(format!("llm.base_url '{}' is invalid: {e}", self.llm.base_url))
        })?;
        if self.retry.max_retries == 0 {
            return Err(ResearchKitError::config("retry.max_retries must be at least 1"));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(ResearchKitError::config(
                "retry.backoff_multiplier must be a finite number >= 1.0",
            ));
        }
        if !self.selection.relevance_threshold.is_finite() {
            return Err(ResearchKitError::config(
                "selection.relevance_threshold must be a finite number",
            ));
        }
        if self.selection.max_round_trips == 0 {
            return Err(ResearchKitError::config(
                "selection.max_round_trips must be at least 1",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.researchkit/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ResearchKitError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.researchkit/researchkit.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| ResearchKitError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ResearchKitError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ResearchKitError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ResearchKitError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ResearchKitError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
