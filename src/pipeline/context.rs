//! Pipeline context: the run's state machine position and counters, as a value.
//!
//! Every transition consumes the context and returns the next one, so each state's
//! invariants can be checked in isolation.

use crate::error::PipelineError;
use crate::persistence::WriteMode;
use crate::pipeline::PipelineState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineContext {
    state: PipelineState,
    consecutive_failures: usize,
    total_failures: usize,
    attempts: u32,
    iterations: usize,
    snapshots_written: usize,
    stalls_corrected: usize,
    persistence_degraded: bool,
    cancelled: bool,
    failure_reason: Option<String>,
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineContext {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Planning,
            consecutive_failures: 0,
            total_failures: 0,
            attempts: 0,
            iterations: 0,
            snapshots_written: 0,
            stalls_corrected: 0,
            persistence_degraded: false,
            cancelled: false,
            failure_reason: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn consecutive_failures(&self) -> usize {
        self.consecutive_failures
    }

    pub fn total_failures(&self) -> usize {
        self.total_failures
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn snapshots_written(&self) -> usize {
        self.snapshots_written
    }

    pub fn stalls_corrected(&self) -> usize {
        self.stalls_corrected
    }

    pub fn persistence_degraded(&self) -> bool {
        self.persistence_degraded
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// True when nothing has recorded a failure or cancellation.
    pub fn is_healthy(&self) -> bool {
        self.failure_reason.is_none() && !self.cancelled
    }

    pub fn transition(self, next: PipelineState) -> Result<Self, PipelineError> {
        if !self.state.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        Ok(Self {
            state: next,
            ..self
        })
    }

    #[must_use]
    pub fn record_iteration(self) -> Self {
        Self {
            iterations: self.iterations + 1,
            ..self
        }
    }

    #[must_use]
    pub fn record_attempts(self, attempts: u32) -> Self {
        Self {
            attempts: self.attempts + attempts,
            ..self
        }
    }

    #[must_use]
    pub fn record_success(self) -> Self {
        Self {
            consecutive_failures: 0,
            ..self
        }
    }

    #[must_use]
    pub fn record_failure(self) -> Self {
        Self {
            consecutive_failures: self.consecutive_failures + 1,
            total_failures: self.total_failures + 1,
            ..self
        }
    }

    #[must_use]
    pub fn record_snapshot(self, mode: WriteMode) -> Self {
        Self {
            snapshots_written: self.snapshots_written + 1,
            persistence_degraded: self.persistence_degraded || mode == WriteMode::Direct,
            ..self
        }
    }

    #[must_use]
    pub fn record_stall(self) -> Self {
        Self {
            stalls_corrected: self.stalls_corrected + 1,
            ..self
        }
    }

    #[must_use]
    pub fn cancel(self) -> Self {
        Self {
            cancelled: true,
            ..self
        }
    }

    /// Records a run-level failure. The first reason wins.
    #[must_use]
    pub fn fail(self, reason: impl Into<String>) -> Self {
        Self {
            failure_reason: self.failure_reason.or_else(|| Some(reason.into())),
            ..self
        }
    }

    pub fn threshold_reached(&self, threshold: usize) -> bool {
        self.consecutive_failures >= threshold
    }
}
