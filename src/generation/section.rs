//! Section generator: bounded retries around the external generator, with a
//! per-attempt timeout and fallback content once retries are exhausted.
//! Never mutates the plan or the artifact.

use crate::config::PipelineConfig;
use crate::error::GenerationError;
use crate::generation::{fallback_content, AttemptResult, GenerationAttempt, StepGenerator};
use crate::plan::Step;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Retry and acceptance limits for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPolicy {
    pub max_retries: u32,
    pub min_content_length: usize,
    pub step_timeout: Duration,
    pub retry_delay: Duration,
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for GenerationPolicy {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_retries: config.max_retries_per_step,
            min_content_length: config.min_acceptable_content_length,
            step_timeout: Duration::from_secs(config.step_timeout_secs),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

pub struct SectionGenerator {
    generator: Arc<dyn StepGenerator>,
    policy: GenerationPolicy,
}

impl SectionGenerator {
    pub fn new(generator: Arc<dyn StepGenerator>, policy: GenerationPolicy) -> Self {
        Self { generator, policy }
    }

    pub fn policy(&self) -> &GenerationPolicy {
        &self.policy
    }

    /// Generates content for `step`. Makes at most `1 + max_retries` calls and never
    /// returns an error: exhaustion yields a failure attempt carrying fallback text.
    pub async fn generate(&self, step: &Step, prior_context: &str) -> GenerationAttempt {
        let max_attempts = self.policy.max_retries.saturating_add(1);
        let mut last_reason = String::new();

        for attempt_number in 1..=max_attempts {
            if attempt_number > 1 && !self.policy.retry_delay.is_zero() {
                tokio::time::sleep(self.policy.retry_delay).await;
            }

            match self.attempt(&step.description, prior_context).await {
                Ok(text) => {
                    debug!(
                        step_index = step.index,
                        attempt = attempt_number,
                        length = text.chars().count(),
                        "Section generated"
                    );
                    return GenerationAttempt {
                        step_index: step.index,
                        attempt_number,
                        result: AttemptResult::Success { text },
                    };
                }
                Err(err) => {
                    warn!(
                        step_index = step.index,
                        attempt = attempt_number,
                        max_attempts,
                        error = %err,
                        "Section generation attempt failed"
                    );
                    last_reason = err.to_string();
                }
            }
        }

        error!(
            step_index = step.index,
            attempts = max_attempts,
            reason = %last_reason,
            "Section generation exhausted retries; using fallback"
        );
        GenerationAttempt {
            step_index: step.index,
            attempt_number: max_attempts,
            result: AttemptResult::Failure {
                reason: last_reason,
                fallback: fallback_content(&step.description),
            },
        }
    }

    /// One bounded call with no length requirement. Used for outlines, titles and
    /// sub-artifact bodies, where the caller has its own fallback.
    pub async fn request_once(
        &self,
        description: &str,
        prior_context: &str,
    ) -> Result<String, GenerationError> {
        tokio::time::timeout(
            self.policy.step_timeout,
            self.generator.generate(description, prior_context),
        )
        .await
        .map_err(|_| GenerationError::Timeout(self.policy.step_timeout))?
    }

    async fn attempt(&self, description: &str, prior_context: &str) -> Result<String, GenerationError> {
        let text = self.request_once(description, prior_context).await?;
        let text = text.trim();
        let length = text.chars().count();
        if length == 0 || length < self.policy.min_content_length {
            return Err(GenerationError::TooShort {
                length,
                minimum: self.policy.min_content_length,
            });
        }
        Ok(text.to_string())
    }
}
