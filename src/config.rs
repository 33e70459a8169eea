//! Configuration System
//!
//! Layered configuration for the generation pipeline: merge-policy defaults, the global
//! user file, workspace files, `SCRIBE__*` environment overrides, and an optional
//! explicit file. Validation collects every problem instead of stopping at the first.

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScribeConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Retry, stall and failure limits for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries_per_step: u32,

    /// Minimum trimmed length, in characters, for generated content to be accepted
    #[serde(default = "default_min_length")]
    pub min_acceptable_content_length: usize,

    /// Consecutive observations of one step index that count as a stall
    #[serde(default = "default_stall_threshold")]
    pub stall_repeat_threshold: u32,

    /// Consecutive step failures that stop the run; `None` means ceil(steps / 2)
    #[serde(default)]
    pub failure_threshold: Option<usize>,

    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Characters of each earlier section passed to the generator as context
    #[serde(default = "default_prior_context_chars")]
    pub prior_context_chars: usize,

    /// Generate sub-artifacts for `[visualize: ...]` markers
    #[serde(default = "default_true")]
    pub sub_artifacts: bool,
}

/// Upper bound for `max_retries_per_step`.
pub const MAX_RETRIES_PER_STEP: u32 = 20;

fn default_max_retries() -> u32 {
    2
}

fn default_min_length() -> usize {
    50
}

fn default_stall_threshold() -> u32 {
    3
}

fn default_step_timeout() -> u64 {
    120
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_prior_context_chars() -> usize {
    500
}

fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries_per_step: default_max_retries(),
            min_acceptable_content_length: default_min_length(),
            stall_repeat_threshold: default_stall_threshold(),
            failure_threshold: None,
            step_timeout_secs: default_step_timeout(),
            retry_delay_ms: default_retry_delay(),
            prior_context_chars: default_prior_context_chars(),
            sub_artifacts: true,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_retries_per_step > MAX_RETRIES_PER_STEP {
            return Err(format!(
                "max_retries_per_step must be at most {} (got {})",
                MAX_RETRIES_PER_STEP, self.max_retries_per_step
            ));
        }
        if self.step_timeout_secs == 0 {
            return Err("step_timeout_secs must be greater than zero".to_string());
        }
        if self.stall_repeat_threshold < 2 {
            return Err(format!(
                "stall_repeat_threshold must be at least 2 (got {})",
                self.stall_repeat_threshold
            ));
        }
        if self.failure_threshold == Some(0) {
            return Err("failure_threshold must be greater than zero when set".to_string());
        }
        Ok(())
    }

    /// Failure threshold for a plan of `total_steps`.
    pub fn effective_failure_threshold(&self, total_steps: usize) -> usize {
        self.failure_threshold
            .unwrap_or_else(|| total_steps.div_ceil(2))
            .max(1)
    }
}

/// Where artifacts and cache entries are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("output")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".scribe/cache")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            cache_dir: default_cache_dir(),
        }
    }
}

impl OutputConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.directory.as_os_str().is_empty() {
            return Err("Output directory cannot be empty".to_string());
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err("Cache directory cannot be empty".to_string());
        }
        Ok(())
    }
}

/// OpenAI-compatible chat completions provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the environment variable holding the API key; unset for keyless endpoints
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_endpoint() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_model() -> String {
    "llama3".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model name cannot be empty".to_string());
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(format!("Invalid endpoint URL: {}", self.endpoint));
        }
        if let Some(temp) = self.temperature {
            if !(0.0..=2.0).contains(&temp) {
                return Err(format!("Temperature must be between 0 and 2 (got {})", temp));
            }
        }
        if self.max_tokens == Some(0) {
            return Err("max_tokens must be greater than zero when set".to_string());
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Pipeline(String),
    Output(String),
    Provider(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Pipeline(msg) => write!(f, "Pipeline: {}", msg),
            ValidationError::Output(msg) => write!(f, "Output: {}", msg),
            ValidationError::Provider(msg) => write!(f, "Provider: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ScribeConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.pipeline.validate() {
            errors.push(ValidationError::Pipeline(e));
        }
        if let Err(e) = self.output.validate() {
            errors.push(ValidationError::Output(e));
        }
        if let Err(e) = self.provider.validate() {
            errors.push(ValidationError::Provider(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
