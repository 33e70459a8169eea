//! Progress reporter boundary and the two accepted progress text formats.
//!
//! Reporters expose progress as text. Two shapes are understood:
//! a `Progress: <completed>/<total> steps` line, and checkbox bullets
//! (`- [ ]`, `- [→]`, `- [✓]`). Bullets win when both are present.

use crate::error::ReporterError;
use crate::plan::{Plan, StepStatus};
use async_trait::async_trait;
use parking_lot::Mutex;

/// External plan/progress source.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    /// Current progress as human-readable text.
    async fn progress_text(&self) -> Result<String, ReporterError>;

    /// Tells the reporter a step reached `status`. Best effort; reporters may ignore it.
    async fn mark_step(&self, index: usize, status: StepStatus) -> Result<(), ReporterError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMark {
    Pending,
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressSnapshot {
    Fraction { completed: usize, total: usize },
    Checklist(Vec<StepMark>),
}

impl ProgressSnapshot {
    pub fn parse(text: &str) -> Option<Self> {
        let marks: Vec<StepMark> = text.lines().filter_map(parse_bullet).collect();
        if !marks.is_empty() {
            return Some(ProgressSnapshot::Checklist(marks));
        }
        text.lines().find_map(parse_fraction_line)
    }

    /// Index the reporter considers active; `None` when everything is done.
    pub fn active_index(&self) -> Option<usize> {
        match self {
            ProgressSnapshot::Fraction { completed, total } => {
                (completed < total).then_some(*completed)
            }
            ProgressSnapshot::Checklist(marks) => marks
                .iter()
                .position(|mark| *mark == StepMark::Active)
                .or_else(|| marks.iter().position(|mark| *mark == StepMark::Pending)),
        }
    }

    pub fn total(&self) -> usize {
        match self {
            ProgressSnapshot::Fraction { total, .. } => *total,
            ProgressSnapshot::Checklist(marks) => marks.len(),
        }
    }
}

fn parse_bullet(line: &str) -> Option<StepMark> {
    let line = line.trim_start();
    if line.starts_with("- [ ]") {
        Some(StepMark::Pending)
    } else if line.starts_with("- [→]") {
        Some(StepMark::Active)
    } else if line.starts_with("- [✓]") {
        Some(StepMark::Completed)
    } else {
        None
    }
}

fn parse_fraction_line(line: &str) -> Option<ProgressSnapshot> {
    let start = line.find("Progress:")?;
    let rest = line[start + "Progress:".len()..].trim_start();
    let (completed, rest) = rest.split_once('/')?;
    let total = rest.trim_start().split_whitespace().next()?;
    let unit = rest.trim_start()[total.len()..].trim_start();
    if !unit.starts_with("steps") {
        return None;
    }
    let completed: usize = completed.trim().parse().ok()?;
    let total: usize = total.parse().ok()?;
    if total == 0 || completed > total {
        return None;
    }
    Some(ProgressSnapshot::Fraction { completed, total })
}

/// In-process reporter backed by a status list. The pipeline marks steps on it as they
/// finish, so it reports the next pending step as active.
pub struct InMemoryReporter {
    titles: Vec<String>,
    statuses: Mutex<Vec<StepStatus>>,
}

impl InMemoryReporter {
    pub fn for_plan(plan: &Plan) -> Self {
        let titles = plan.steps().iter().map(|step| step.title.clone()).collect();
        let mut statuses = vec![StepStatus::Pending; plan.total_steps()];
        if let Some(first) = statuses.first_mut() {
            *first = StepStatus::Active;
        }
        Self {
            titles,
            statuses: Mutex::new(statuses),
        }
    }

    /// Structured status query; avoids text round-trips for in-process callers.
    pub fn statuses(&self) -> Vec<StepStatus> {
        self.statuses.lock().clone()
    }
}

#[async_trait]
impl ProgressReporter for InMemoryReporter {
    async fn progress_text(&self) -> Result<String, ReporterError> {
        let statuses = self.statuses.lock();
        let done = statuses.iter().filter(|s| s.is_terminal()).count();
        let mut out = format!("Progress: {}/{} steps\n", done, statuses.len());
        for (title, status) in self.titles.iter().zip(statuses.iter()) {
            out.push_str(&format!("- {} {}\n", status.checkbox(), title));
        }
        Ok(out)
    }

    async fn mark_step(&self, index: usize, status: StepStatus) -> Result<(), ReporterError> {
        let mut statuses = self.statuses.lock();
        let total = statuses.len();
        let slot = statuses.get_mut(index).ok_or_else(|| {
            ReporterError::Unavailable(format!("step {} out of range ({} steps)", index, total))
        })?;
        *slot = status;
        if status.is_terminal() && !statuses.iter().any(|s| *s == StepStatus::Active) {
            if let Some(next) = statuses.iter_mut().find(|s| **s == StepStatus::Pending) {
                *next = StepStatus::Active;
            }
        }
        Ok(())
    }
}
