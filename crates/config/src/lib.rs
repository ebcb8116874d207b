//! Configuration loading, validation, and management for FinQA.
//!
//! Loads configuration from `~/.finqa/config.toml` (or an explicit path) with
//! environment variable overrides. Validates all settings at startup.

use finqa_core::{ModelTier, StudyCondition};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.finqa/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Completion token cap per gateway call; unset leaves it to the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Concrete model per capability tier
    #[serde(default)]
    pub models: ModelsConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Instruction set overrides
    #[serde(default)]
    pub prompts: PromptsConfig,

    /// Study run settings
    #[serde(default)]
    pub study: StudyConfig,

    /// Telemetry and cost tracking
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_provider() -> String {
    "openai".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("max_tokens", &self.max_tokens)
            .field("models", &self.models)
            .field("providers", &self.providers)
            .field("prompts", &self.prompts)
            .field("study", &self.study)
            .field("telemetry", &self.telemetry)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Model names for each tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_mini_model")]
    pub mini: String,

    #[serde(default = "default_standard_model")]
    pub standard: String,
}

fn default_mini_model() -> String {
    "gpt-5-mini".into()
}
fn default_standard_model() -> String {
    "gpt-5.2".into()
}

impl ModelsConfig {
    /// The configured model for a tier.
    pub fn for_tier(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Mini => &self.mini,
            ModelTier::Standard => &self.standard,
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            mini: default_mini_model(),
            standard: default_standard_model(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// Where instruction sets come from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// Directory holding `baseline.md`, `planner.md`, `analyst.md` and
    /// `reviewer.md`. Unset uses the built-in set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// Settings for a study run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfig {
    /// Dataset file: a JSON object mapping split name → records
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    #[serde(default = "default_split")]
    pub split: String,

    /// Records sampled per condition
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Sampling seed; the same seed yields the same records for every condition
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Where result files are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Records processed concurrently within a condition
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Condition ids to run, in order
    #[serde(default = "default_conditions")]
    pub conditions: Vec<u8>,
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data/convfinqa_dataset.json")
}
fn default_split() -> String {
    "train".into()
}
fn default_sample_size() -> usize {
    15
}
fn default_seed() -> u64 {
    42
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_concurrency() -> usize {
    1
}
fn default_conditions() -> Vec<u8> {
    StudyCondition::ALL.iter().map(|c| c.id()).collect()
}

impl StudyConfig {
    /// Resolve the configured ids into conditions.
    pub fn selected_conditions(&self) -> Result<Vec<StudyCondition>, ConfigError> {
        self.conditions
            .iter()
            .map(|&id| {
                StudyCondition::from_id(id).ok_or_else(|| {
                    ConfigError::ValidationError(format!(
                        "unknown condition id {id} (expected 1-{})",
                        StudyCondition::ALL.len()
                    ))
                })
            })
            .collect()
    }
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            split: default_split(),
            sample_size: default_sample_size(),
            seed: default_seed(),
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
            conditions: default_conditions(),
        }
    }
}

/// Telemetry and cost tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Whether telemetry is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Custom model pricing overrides (model name → pricing)
    #[serde(default)]
    pub custom_pricing: HashMap<String, PricingOverrideConfig>,
}

fn default_true() -> bool {
    true
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            custom_pricing: HashMap::new(),
        }
    }
}

/// Custom per-million-token pricing for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingOverrideConfig {
    /// Price per 1M input tokens in USD
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD
    pub output_per_m: f64,
}

impl AppConfig {
    /// Load configuration from the default path (~/.finqa/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_at(None)
    }

    /// Load from `path` (or the default path), then apply environment overrides:
    /// - `FINQA_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `FINQA_PROVIDER`
    /// - `FINQA_DATA_PATH`
    pub fn load_at(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Self::config_dir().join("config.toml"));
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("FINQA_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(provider) = lookup("FINQA_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(data_path) = lookup("FINQA_DATA_PATH") {
            self.study.data_path = PathBuf::from(data_path);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".finqa")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.study.sample_size == 0 {
            return Err(ConfigError::ValidationError(
                "study.sample_size must be at least 1".into(),
            ));
        }

        if self.study.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "study.concurrency must be at least 1".into(),
            ));
        }

        if self.models.mini.trim().is_empty() || self.models.standard.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "models.mini and models.standard must be non-empty".into(),
            ));
        }

        self.study.selected_conditions()?;
        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            max_tokens: None,
            models: ModelsConfig::default(),
            providers: HashMap::new(),
            prompts: PromptsConfig::default(),
            study: StudyConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
