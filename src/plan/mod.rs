//! Step plan: ordered steps, their status lifecycle, and tracking against an external reporter.
//! The tracker owns the plan for one run; reporter text parsing lives in `progress`.

pub mod outline;
pub mod progress;
pub mod tracker;

pub use outline::{default_structure, parse_outline, parse_title_suggestions, strip_code_fence};
pub use progress::{InMemoryReporter, ProgressReporter, ProgressSnapshot, StepMark};
pub use tracker::{PlanTracker, Resolution, StallState};

use crate::error::PlanError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Active,
    Completed,
    Skipped,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Skipped | StepStatus::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Active => "active",
            StepStatus::Completed => "completed",
            StepStatus::Skipped => "skipped",
            StepStatus::Failed => "failed",
        }
    }

    /// Checkbox used in the bullet progress format.
    pub fn checkbox(self) -> &'static str {
        match self {
            StepStatus::Pending => "[ ]",
            StepStatus::Active => "[→]",
            StepStatus::Completed | StepStatus::Skipped | StepStatus::Failed => "[✓]",
        }
    }

    fn can_transition_to(self, next: StepStatus) -> bool {
        match self {
            StepStatus::Pending => matches!(
                next,
                StepStatus::Active | StepStatus::Skipped | StepStatus::Completed
            ),
            StepStatus::Active => next.is_terminal(),
            StepStatus::Completed | StepStatus::Skipped | StepStatus::Failed => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub index: usize,
    pub title: String,
    /// Static description handed to the generator; defaults to the title.
    pub description: String,
    pub status: StepStatus,
    pub content: Option<String>,
    pub retry_count: u32,
}

impl Step {
    pub fn new(index: usize, title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            index,
            description: title.clone(),
            title,
            status: StepStatus::Pending,
            content: None,
            retry_count: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    steps: Vec<Step>,
}

impl Plan {
    pub fn new<I, S>(titles: I) -> Result<Self, PlanError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let steps: Vec<Step> = titles
            .into_iter()
            .map(Into::into)
            .filter(|title: &String| !title.trim().is_empty())
            .enumerate()
            .map(|(index, title)| Step::new(index, title.trim()))
            .collect();
        Self::from_steps(steps)
    }

    /// Builds a plan from pre-constructed steps, re-indexing them contiguously.
    pub fn from_steps(steps: Vec<Step>) -> Result<Self, PlanError> {
        if steps.is_empty() {
            return Err(PlanError::EmptyPlan);
        }
        let steps = steps
            .into_iter()
            .enumerate()
            .map(|(index, mut step)| {
                step.index = index;
                step
            })
            .collect();
        Ok(Self { steps })
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn active_index(&self) -> Option<usize> {
        self.steps
            .iter()
            .find(|step| step.status == StepStatus::Active)
            .map(|step| step.index)
    }

    /// First step at or after `from` that has not reached a terminal status.
    pub fn first_open_from(&self, from: usize) -> Option<usize> {
        self.steps
            .iter()
            .skip(from)
            .find(|step| !step.status.is_terminal())
            .map(|step| step.index)
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|step| step.status == status).count()
    }

    pub fn is_exhausted(&self) -> bool {
        self.steps.iter().all(|step| step.status.is_terminal())
    }

    pub(crate) fn transition(&mut self, index: usize, next: StepStatus) -> Result<&mut Step, PlanError> {
        let total = self.steps.len();
        if next == StepStatus::Active {
            if let Some(active) = self.active_index() {
                if active != index {
                    return Err(PlanError::AlreadyActive { index, active });
                }
            }
        }
        let step = self
            .steps
            .get_mut(index)
            .ok_or(PlanError::StepOutOfRange { index, total })?;
        if !step.status.can_transition_to(next) {
            return Err(PlanError::InvalidTransition {
                index,
                from: step.status,
                to: next,
            });
        }
        step.status = next;
        Ok(step)
    }

    /// Renders the plan in the bullet progress format, headed by the fraction line.
    pub fn render_checklist(&self) -> String {
        let done = self
            .steps
            .iter()
            .filter(|step| step.status.is_terminal())
            .count();
        let mut out = format!("Progress: {}/{} steps\n", done, self.total_steps());
        for step in &self.steps {
            out.push_str(&format!("- {} {}\n", step.status.checkbox(), step.title));
        }
        out
    }
}
