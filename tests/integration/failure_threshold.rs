//! Consecutive persistent failures stop the run early; the partial artifact survives.

use super::test_utils::{body, fast_config, ScriptedGenerator};
use scribe::config::PipelineConfig;
use scribe::persistence::{inspect, ArtifactState};
use scribe::pipeline::{PipelineController, PipelineRequest, PipelineState, RunStatus};
use scribe::plan::StepStatus;
use std::sync::Arc;
use tempfile::TempDir;

const SIX_STEPS: [&str; 6] = ["Alpha", "Bravo", "Charlie", "Delta", "Echo", "Foxtrot"];

fn config() -> PipelineConfig {
    PipelineConfig {
        failure_threshold: Some(3),
        ..fast_config()
    }
}

#[tokio::test]
async fn three_consecutive_failures_end_the_run() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out").join("doc.md");
    let generator = Arc::new(
        ScriptedGenerator::new()
            .always_failing("Charlie")
            .always_failing("Delta")
            .always_failing("Echo"),
    );
    let controller = PipelineController::new(generator.clone(), config());
    let request = PipelineRequest::new("radio alphabet", &path)
        .with_steps(SIX_STEPS)
        .with_title("Phonetics");

    let outcome = controller.run(request).await;

    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(outcome.report.final_state, PipelineState::Failed);
    assert_eq!(generator.calls_for("Foxtrot"), 0);

    let statuses: Vec<StepStatus> = outcome.report.steps.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![
            StepStatus::Completed,
            StepStatus::Completed,
            StepStatus::Failed,
            StepStatus::Failed,
            StepStatus::Failed,
            StepStatus::Skipped,
        ]
    );
    assert!(outcome.report.failure_reason.is_some());

    let on_disk = std::fs::read_to_string(&path).unwrap();
    assert_eq!(on_disk, outcome.artifact);
    assert!(on_disk.contains(&body("Alpha (radio alphabet)")));
    assert!(on_disk.contains(&body("Bravo (radio alphabet)")));
    assert!(on_disk.contains(scribe::assembly::SKIPPED_PLACEHOLDER));
    assert!(!on_disk.contains(scribe::assembly::IN_PROGRESS_PLACEHOLDER));

    assert_eq!(inspect(&path), ArtifactState::Failed);
    assert!(path.with_file_name("doc.md.error").is_file());
    assert!(!path.with_file_name("doc.md.completed").is_file());
}

#[tokio::test]
async fn a_success_between_failures_resets_the_count() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .always_failing("Alpha")
            .always_failing("Bravo")
            .always_failing("Delta")
            .always_failing("Echo"),
    );
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("doc.md");
    let controller = PipelineController::new(generator, config());
    let request = PipelineRequest::new("radio alphabet", &path)
        .with_steps(SIX_STEPS)
        .with_title("Phonetics");

    let outcome = controller.run(request).await;

    assert_eq!(outcome.status, RunStatus::Degraded);
    assert_eq!(outcome.report.failures, 4);
    assert_eq!(outcome.report.count(StepStatus::Completed), 2);
    assert_eq!(inspect(&path), ArtifactState::Completed);
}
