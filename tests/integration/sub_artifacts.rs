//! Visualization markers in generated sections become inline code blocks.

use super::test_utils::{fast_config, RecordingStore, ScriptedGenerator};
use scribe::config::PipelineConfig;
use scribe::pipeline::{PipelineController, PipelineRequest, RunStatus};
use std::sync::Arc;

const SECTION: &str = "Twice a day the sea reaches [visualize: tide chart]high water[/visualize] \
and then retreats as the [visualize: moon orbit]lunar bulge[/visualize] moves on.";

fn request() -> PipelineRequest {
    PipelineRequest::new("tides", "unused.md")
        .with_steps(["Cycle"])
        .with_title("Tides")
}

fn config(sub_artifacts: bool) -> PipelineConfig {
    PipelineConfig {
        sub_artifacts,
        ..fast_config()
    }
}

#[tokio::test]
async fn markers_are_replaced_by_generated_blocks() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .script("Cycle", vec![Ok(SECTION.to_string())])
            .script(
                "visualization of: tide chart",
                vec![Ok("```python\nplot(tide_heights)\n```".to_string())],
            )
            .script("visualization of: moon orbit", vec![Ok("SKIP".to_string())]),
    );
    let store = RecordingStore::new();
    let controller = PipelineController::new(generator, config(true));

    let outcome = controller.run_with_store(request(), &store).await;

    assert_eq!(outcome.status, RunStatus::Complete);
    let artifact = &outcome.artifact;
    assert!(!artifact.contains("[visualize:"));
    assert!(!artifact.contains("[/visualize]"));
    assert!(artifact.contains(
        "high water\n\n**Visualization:** tide chart\n\n```\nplot(tide_heights)\n```\n"
    ));
    assert!(artifact.contains("lunar bulge moves on."));
    assert!(!artifact.contains("moon orbit"));
}

#[tokio::test]
async fn disabled_sub_artifacts_only_strip_markers() {
    let generator = Arc::new(ScriptedGenerator::new().script("Cycle", vec![Ok(SECTION.to_string())]));
    let store = RecordingStore::new();
    let controller = PipelineController::new(generator.clone(), config(false));

    let outcome = controller.run_with_store(request(), &store).await;

    assert!(outcome
        .artifact
        .contains("Twice a day the sea reaches high water and then retreats as the lunar bulge moves on."));
    assert_eq!(generator.calls_for("visualization of"), 0);
}
