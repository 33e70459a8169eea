//! Pipeline: the top-level generation loop and its state machine.
//!
//! `Planning -> GeneratingTitles -> GeneratingStructure -> GeneratingSections ->
//! Finalizing -> Done | Failed`. Any earlier state may jump to `Finalizing`; the two
//! terminal states are entered from `Finalizing` only.

pub mod cancel;
pub mod context;
pub mod controller;

pub use cancel::CancelHandle;
pub use context::PipelineContext;
pub use controller::{
    outline_request, section_description, sub_artifact_request, title_request, PipelineController,
    PlanPreview,
};

use crate::plan::StepStatus;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Planning,
    GeneratingTitles,
    GeneratingStructure,
    GeneratingSections,
    Finalizing,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Planning => "planning",
            PipelineState::GeneratingTitles => "generating_titles",
            PipelineState::GeneratingStructure => "generating_structure",
            PipelineState::GeneratingSections => "generating_sections",
            PipelineState::Finalizing => "finalizing",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }

    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Planning, GeneratingTitles)
            | (GeneratingTitles, GeneratingStructure)
            | (GeneratingStructure, GeneratingSections) => true,
            (Planning | GeneratingTitles | GeneratingStructure | GeneratingSections, Finalizing) => {
                true
            }
            (Finalizing, Done | Failed) => true,
            _ => false,
        }
    }
}

/// Status flag handed to the caller with the rendered artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every step produced generated content.
    Complete,
    /// Finished, but some steps hold fallback or skipped content, or snapshots were
    /// written non-atomically.
    Degraded,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Complete => "complete",
            RunStatus::Degraded => "degraded",
            RunStatus::Failed => "failed",
        }
    }
}

/// What to generate and where to persist it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRequest {
    pub topic: String,
    /// Step titles; empty means ask the generator for an outline.
    pub steps: Vec<String>,
    /// Working title; `None` means ask the generator for suggestions.
    pub title: Option<String>,
    pub audience: Option<String>,
    pub sources: Vec<String>,
    pub output_path: PathBuf,
}

impl PipelineRequest {
    pub fn new(topic: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            topic: topic.into(),
            steps: Vec::new(),
            title: None,
            audience: None,
            sources: Vec::new(),
            output_path: output_path.into(),
        }
    }

    pub fn with_steps<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps = steps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSummary {
    pub index: usize,
    pub title: String,
    pub status: StepStatus,
    pub retry_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub title: String,
    pub final_state: PipelineState,
    pub steps: Vec<StepSummary>,
    pub attempts: u32,
    pub failures: usize,
    pub stalls_corrected: usize,
    pub snapshots_written: usize,
    pub persistence_degraded: bool,
    pub cancelled: bool,
    pub failure_reason: Option<String>,
    /// Sentinel written at finalization, if any.
    pub marker: Option<PathBuf>,
}

impl RunReport {
    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }
}

/// Result of a run. Always carries a rendered artifact, even when the run failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub status: RunStatus,
    pub artifact: String,
    pub output_path: PathBuf,
    pub report: RunReport,
}

/// Default artifact path: `<dir>/script_<sanitized topic>_<YYYYmmdd_HHMMSS>.md`.
pub fn default_output_path(directory: &std::path::Path, topic: &str) -> PathBuf {
    let safe: String = topic
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    directory.join(format!("script_{}_{}.md", safe, timestamp))
}
