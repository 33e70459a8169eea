//! Plan tracker: resolves the step to work on from reporter text, detects stalls, and
//! applies corrective advancement. Owns the plan for the duration of one run.

use crate::error::{PlanError, ReporterError};
use crate::plan::progress::ProgressSnapshot;
use crate::plan::{Plan, Step, StepStatus};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Repeat counter for the most recently observed step index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StallState {
    pub last_observed_index: Option<usize>,
    pub repeat_count: u32,
}

impl StallState {
    /// Records an observation and returns the updated repeat count.
    pub fn observe(&mut self, index: usize) -> u32 {
        if self.last_observed_index == Some(index) {
            self.repeat_count += 1;
        } else {
            self.last_observed_index = Some(index);
            self.repeat_count = 1;
        }
        self.repeat_count
    }
}

/// How the tracker arrived at the index it handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Parsed from reporter text.
    Reported,
    /// Reporter unusable, exhausted, or behind; advanced through the internal plan.
    Sequential,
}

pub struct PlanTracker {
    plan: Plan,
    stall: StallState,
    stall_threshold: u32,
    /// Lowest index the tracker will hand out; keeps resolved indices non-decreasing.
    floor: usize,
    last_resolution: Option<Resolution>,
}

impl PlanTracker {
    pub fn new(plan: Plan, stall_threshold: u32) -> Self {
        Self {
            plan,
            stall: StallState::default(),
            stall_threshold: stall_threshold.max(1),
            floor: 0,
            last_resolution: None,
        }
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn into_plan(self) -> Plan {
        self.plan
    }

    pub fn total_steps(&self) -> usize {
        self.plan.total_steps()
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.plan.step(index)
    }

    /// Index of the single active step, if any.
    pub fn active_index(&self) -> Option<usize> {
        self.plan.active_index()
    }

    pub fn stall_state(&self) -> &StallState {
        &self.stall
    }

    pub fn last_resolution(&self) -> Option<Resolution> {
        self.last_resolution
    }

    /// Resolves the next step index from a reporter poll.
    ///
    /// Unreachable reporters, unparseable text, an exhausted report, and reports behind
    /// the tracker's floor all fall back to sequential advancement through the internal
    /// plan. Returns `None` once no open step remains at or after the floor.
    pub fn resolve(&mut self, report: Result<String, ReporterError>) -> Option<usize> {
        let total = self.plan.total_steps();
        let reported = match report {
            Ok(text) => match ProgressSnapshot::parse(&text) {
                Some(snapshot) => {
                    if snapshot.total() != total {
                        debug!(
                            reported_total = snapshot.total(),
                            total_steps = total,
                            "Reporter step count differs from plan"
                        );
                    }
                    snapshot.active_index().filter(|index| *index < total)
                }
                None => {
                    warn!("Progress text unparseable; advancing sequentially");
                    None
                }
            },
            Err(err) => {
                warn!(error = %err, "Progress reporter unavailable; advancing sequentially");
                None
            }
        };

        let next = match reported {
            Some(index) if index >= self.floor => {
                self.last_resolution = Some(Resolution::Reported);
                Some(index)
            }
            _ => {
                self.last_resolution = Some(Resolution::Sequential);
                self.plan.first_open_from(self.floor)
            }
        };
        if let Some(index) = next {
            self.floor = self.floor.max(index);
        }
        next
    }

    /// Records an observation of `index`; true once it repeated `stall_threshold` times.
    pub fn observe_and_detect_stall(&mut self, index: usize) -> bool {
        let repeats = self.stall.observe(index);
        repeats >= self.stall_threshold
    }

    /// Moves the tracker past `index`. A step that never received content is closed as
    /// `Skipped`; a step that already reached a terminal status keeps it.
    /// Returns the next open step, if any.
    pub fn force_advance(&mut self, index: usize) -> Result<Option<usize>, PlanError> {
        let total = self.plan.total_steps();
        let status = self
            .plan
            .step(index)
            .map(|step| step.status)
            .ok_or(PlanError::StepOutOfRange { index, total })?;
        if !status.is_terminal() {
            let step = self.plan.transition(index, StepStatus::Skipped)?;
            step.content = None;
        }
        warn!(
            step_index = index,
            previous_status = status.as_str(),
            "Forced plan past stalled step"
        );
        self.floor = self.floor.max(index + 1);
        self.stall = StallState::default();
        Ok(self.plan.first_open_from(self.floor))
    }

    pub fn begin(&mut self, index: usize) -> Result<&Step, PlanError> {
        let step = self.plan.transition(index, StepStatus::Active)?;
        Ok(&*step)
    }

    pub fn complete(&mut self, index: usize, content: String, retry_count: u32) -> Result<(), PlanError> {
        let step = self.plan.transition(index, StepStatus::Completed)?;
        step.content = Some(content);
        step.retry_count = retry_count;
        Ok(())
    }

    pub fn fail(&mut self, index: usize, fallback: String, retry_count: u32) -> Result<(), PlanError> {
        let step = self.plan.transition(index, StepStatus::Failed)?;
        step.content = Some(fallback);
        step.retry_count = retry_count;
        Ok(())
    }

    pub fn skip(&mut self, index: usize) -> Result<(), PlanError> {
        self.plan.transition(index, StepStatus::Skipped)?;
        Ok(())
    }

    /// Closes every open step as `Skipped`; returns the affected indices.
    pub fn skip_open_steps(&mut self) -> Vec<usize> {
        let open: Vec<usize> = self
            .plan
            .steps()
            .iter()
            .filter(|step| !step.status.is_terminal())
            .map(|step| step.index)
            .collect();
        for index in &open {
            // Open steps are Pending or Active, both of which may be skipped.
            let _ = self.plan.transition(*index, StepStatus::Skipped);
        }
        open
    }
}
