//! A five-step run where one step needs two retries.

use super::test_utils::{body, fast_config, RecordingStore, ScriptedGenerator, StoreEvent, FIVE_STEPS};
use scribe::error::GenerationError;
use scribe::pipeline::{PipelineController, PipelineRequest, PipelineState, RunStatus};
use scribe::plan::StepStatus;
use std::sync::Arc;

fn request() -> PipelineRequest {
    PipelineRequest::new("Rust ownership", "unused.md")
        .with_steps(FIVE_STEPS)
        .with_title("Ownership in Practice")
}

#[tokio::test]
async fn core_succeeds_on_third_attempt() {
    let third = body("Core third attempt");
    let generator = Arc::new(ScriptedGenerator::new().script(
        "Core",
        vec![
            Ok("too short".to_string()),
            Err(GenerationError::RequestFailed("connection reset".to_string())),
            Ok(third.clone()),
        ],
    ));
    let store = RecordingStore::new();
    let controller = PipelineController::new(generator.clone(), fast_config());

    let outcome = controller.run_with_store(request(), &store).await;

    assert_eq!(outcome.status, RunStatus::Complete);
    assert_eq!(outcome.report.final_state, PipelineState::Done);
    assert_eq!(generator.calls_for("Core"), 3);

    let core = &outcome.report.steps[2];
    assert_eq!(core.title, "Core");
    assert_eq!(core.status, StepStatus::Completed);
    assert_eq!(core.retry_count, 2);
    assert!(outcome
        .artifact
        .contains(&format!("## Core\n\n{}", third)));
    assert!(!outcome.artifact.contains("too short"));

    let events = store.events();
    assert_eq!(events.last(), Some(&StoreEvent::Finalize(true)));
    let snapshots_before_finalize = events
        .iter()
        .take_while(|event| !matches!(event, StoreEvent::Finalize(_)))
        .count();
    assert_eq!(snapshots_before_finalize, 5);
    assert_eq!(outcome.report.snapshots_written, 5);
    assert_eq!(outcome.report.attempts, 7);
}

#[tokio::test]
async fn sections_render_in_plan_order() {
    let generator = Arc::new(ScriptedGenerator::new());
    let store = RecordingStore::new();
    let controller = PipelineController::new(generator, fast_config());

    let outcome = controller.run_with_store(request(), &store).await;

    let positions: Vec<usize> = FIVE_STEPS
        .iter()
        .map(|title| {
            outcome
                .artifact
                .find(&format!("## {}\n", title))
                .unwrap_or_else(|| panic!("missing section {}", title))
        })
        .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(outcome.artifact.starts_with("# Ownership in Practice\n"));

    // Each intermediate snapshot shows the remaining sections as in progress.
    let snapshots = store.snapshots();
    assert!(snapshots[0].contains(scribe::assembly::IN_PROGRESS_PLACEHOLDER));
    assert!(!snapshots[4].contains(scribe::assembly::IN_PROGRESS_PLACEHOLDER));
    assert_eq!(snapshots[4], outcome.artifact);
}

#[tokio::test]
async fn exhausted_retries_store_fallback_and_degrade() {
    let generator = Arc::new(ScriptedGenerator::new().always_failing("Applications"));
    let store = RecordingStore::new();
    let controller = PipelineController::new(generator.clone(), fast_config());

    let outcome = controller.run_with_store(request(), &store).await;

    assert_eq!(outcome.status, RunStatus::Degraded);
    assert_eq!(generator.calls_for("Applications"), 3);
    let applications = &outcome.report.steps[3];
    assert_eq!(applications.status, StepStatus::Failed);
    assert_eq!(applications.retry_count, 2);
    assert!(outcome
        .artifact
        .contains(scribe::generation::FAILED_GENERATION_MARKER));
    assert!(outcome.artifact.contains("## Summary\n"));
    assert_eq!(store.events().last(), Some(&StoreEvent::Finalize(true)));
}
