//! Stuck progress reporters and cooperative cancellation.

use super::test_utils::{fast_config, RecordingStore, ScriptedGenerator, StoreEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use scribe::error::{GenerationError, ReporterError};
use scribe::generation::StepGenerator;
use scribe::pipeline::{CancelHandle, PipelineController, PipelineRequest, RunStatus};
use scribe::plan::{ProgressReporter, StepStatus};
use std::sync::Arc;

/// Reporter that never moves past the first step.
#[derive(Default)]
struct StuckReporter {
    polls: Mutex<usize>,
}

#[async_trait]
impl ProgressReporter for StuckReporter {
    async fn progress_text(&self) -> Result<String, ReporterError> {
        *self.polls.lock() += 1;
        Ok("Progress: 0/3 steps".to_string())
    }

    async fn mark_step(&self, _index: usize, _status: StepStatus) -> Result<(), ReporterError> {
        Err(ReporterError::Unavailable("read-only".to_string()))
    }
}

/// Reporter that is always unreachable.
struct DownReporter;

#[async_trait]
impl ProgressReporter for DownReporter {
    async fn progress_text(&self) -> Result<String, ReporterError> {
        Err(ReporterError::Unavailable("connection refused".to_string()))
    }

    async fn mark_step(&self, _index: usize, _status: StepStatus) -> Result<(), ReporterError> {
        Err(ReporterError::Unavailable("connection refused".to_string()))
    }
}

fn request() -> PipelineRequest {
    PipelineRequest::new("tides", "unused.md")
        .with_steps(["Moon", "Sun", "Coastline"])
        .with_title("Tides")
}

#[tokio::test]
async fn stuck_reporter_is_corrected_and_every_step_runs_once() {
    let generator = Arc::new(ScriptedGenerator::new());
    let reporter = Arc::new(StuckReporter::default());
    let store = RecordingStore::new();
    let controller =
        PipelineController::new(generator.clone(), fast_config()).with_reporter(reporter.clone());

    let outcome = controller.run_with_store(request(), &store).await;

    assert_eq!(outcome.status, RunStatus::Complete);
    assert_eq!(outcome.report.stalls_corrected, 1);
    assert_eq!(outcome.report.count(StepStatus::Completed), 3);
    for keyword in ["Moon", "Sun", "Coastline"] {
        assert_eq!(generator.calls_for(keyword), 1, "{} generated once", keyword);
    }
    assert!(*reporter.polls.lock() >= 4);
    assert_eq!(store.snapshots().len(), 3);
}

#[tokio::test]
async fn unreachable_reporter_falls_back_to_sequential_order() {
    let generator = Arc::new(ScriptedGenerator::new());
    let store = RecordingStore::new();
    let controller = PipelineController::new(generator, fast_config())
        .with_reporter(Arc::new(DownReporter));

    let outcome = controller.run_with_store(request(), &store).await;

    assert_eq!(outcome.status, RunStatus::Complete);
    assert_eq!(outcome.report.stalls_corrected, 0);
    let titles: Vec<&str> = outcome.report.steps.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["Moon", "Sun", "Coastline"]);
}

/// Generator that requests cancellation while producing a chosen step.
struct CancellingGenerator {
    inner: ScriptedGenerator,
    trigger: &'static str,
    cancel: CancelHandle,
}

#[async_trait]
impl StepGenerator for CancellingGenerator {
    async fn generate(
        &self,
        step_description: &str,
        prior_context: &str,
    ) -> Result<String, GenerationError> {
        if step_description.contains(self.trigger) {
            self.cancel.cancel();
        }
        self.inner.generate(step_description, prior_context).await
    }
}

#[tokio::test]
async fn cancellation_finishes_the_current_step_then_finalizes() {
    let cancel = CancelHandle::new();
    let generator = Arc::new(CancellingGenerator {
        inner: ScriptedGenerator::new(),
        trigger: "Sun",
        cancel: cancel.clone(),
    });
    let store = RecordingStore::new();
    let controller =
        PipelineController::new(generator, fast_config()).with_cancel_handle(cancel.clone());

    let outcome = controller.run_with_store(request(), &store).await;

    assert!(outcome.report.cancelled);
    assert_eq!(outcome.status, RunStatus::Failed);
    let statuses: Vec<StepStatus> = outcome.report.steps.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![StepStatus::Completed, StepStatus::Completed, StepStatus::Skipped]
    );
    assert!(outcome.artifact.contains(scribe::assembly::SKIPPED_PLACEHOLDER));
    // Two step snapshots, the final render with the skipped section, then finalize.
    let events = store.events();
    let snapshots = store.snapshots();
    assert_eq!(snapshots.len(), 3);
    assert_eq!(outcome.report.snapshots_written, 3);
    assert_eq!(snapshots.last(), Some(&outcome.artifact));
    assert!(!snapshots[2].contains(scribe::assembly::IN_PROGRESS_PLACEHOLDER));
    assert_eq!(events.last(), Some(&StoreEvent::Finalize(false)));
}
