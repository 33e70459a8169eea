//! Error types for the staged generation pipeline.

use crate::plan::StepStatus;
use crate::pipeline::PipelineState;
use std::path::PathBuf;
use thiserror::Error;

/// Plan-related errors
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Plan must contain at least one step")]
    EmptyPlan,

    #[error("Step index {index} out of range (plan has {total} steps)")]
    StepOutOfRange { index: usize, total: usize },

    #[error("Illegal transition for step {index}: {from:?} -> {to:?}")]
    InvalidTransition {
        index: usize,
        from: StepStatus,
        to: StepStatus,
    },

    #[error("Step {index} cannot become active while step {active} is active")]
    AlreadyActive { index: usize, active: usize },
}

/// Errors returned by a step-content generator
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("Generator request failed: {0}")]
    RequestFailed(String),

    #[error("Generator authentication failed: {0}")]
    AuthFailed(String),

    #[error("Generator rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Generator returned a malformed response: {0}")]
    MalformedResponse(String),

    #[error("Generation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Generated content too short: {length} chars (minimum {minimum})")]
    TooShort { length: usize, minimum: usize },

    #[error("Generator not configured: {0}")]
    NotConfigured(String),
}

/// Errors returned by a plan/progress reporter
#[derive(Debug, Clone, Error)]
pub enum ReporterError {
    #[error("Progress reporter unavailable: {0}")]
    Unavailable(String),
}

/// Snapshot and marker persistence errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to rename {from:?} to {to:?}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Persistence I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Pipeline-level errors. Only state machine misuse, setup problems and failed runs
/// surface here; individual step failures are absorbed by the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Illegal pipeline transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: PipelineState,
        to: PipelineState,
    },

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The run finished in the failed state. Carries the rendered run summary.
    #[error("{0}")]
    RunFailed(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}
