//! Step-content generation: the generator boundary, bounded-retry section generation,
//! a content-keyed cache, and the HTTP-backed generator.

pub mod cache;
pub mod http;
pub mod section;

pub use cache::CachedGenerator;
pub use http::HttpGenerator;
pub use section::{GenerationPolicy, SectionGenerator};

use crate::error::GenerationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Appended to fallback content when a step exhausts its retries.
pub const FAILED_GENERATION_MARKER: &str = "[generation failed: content unavailable for this section]";

/// External step-content generator. Nondeterministic and possibly slow.
#[async_trait]
pub trait StepGenerator: Send + Sync {
    async fn generate(
        &self,
        step_description: &str,
        prior_context: &str,
    ) -> Result<String, GenerationError>;
}

#[async_trait]
impl<G: StepGenerator + ?Sized> StepGenerator for std::sync::Arc<G> {
    async fn generate(
        &self,
        step_description: &str,
        prior_context: &str,
    ) -> Result<String, GenerationError> {
        (**self).generate(step_description, prior_context).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptResult {
    Success { text: String },
    Failure { reason: String, fallback: String },
}

/// Outcome of generating one step: the final attempt and what it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationAttempt {
    pub step_index: usize,
    /// 1-based number of the attempt that settled the step.
    pub attempt_number: u32,
    pub result: AttemptResult,
}

impl GenerationAttempt {
    pub fn is_success(&self) -> bool {
        matches!(self.result, AttemptResult::Success { .. })
    }

    pub fn retry_count(&self) -> u32 {
        self.attempt_number.saturating_sub(1)
    }

    /// Generated text on success, fallback text on failure.
    pub fn text(&self) -> &str {
        match &self.result {
            AttemptResult::Success { text } => text,
            AttemptResult::Failure { fallback, .. } => fallback,
        }
    }

    pub fn into_text(self) -> String {
        match self.result {
            AttemptResult::Success { text } => text,
            AttemptResult::Failure { fallback, .. } => fallback,
        }
    }
}

/// Fallback content for a step: its static description plus the failure marker.
pub fn fallback_content(step_description: &str) -> String {
    let description = step_description.trim();
    if description.is_empty() {
        FAILED_GENERATION_MARKER.to_string()
    } else {
        format!("{}\n\n{}", description, FAILED_GENERATION_MARKER)
    }
}
