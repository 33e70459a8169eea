//! Pipeline runs against the real filesystem store.

use super::test_utils::{body, fast_config, ScriptedGenerator};
use parking_lot::Mutex;
use scribe::error::PersistenceError;
use scribe::persistence::{inspect, ArtifactState, DurablePersistence, SnapshotStore, WriteMode};
use scribe::pipeline::{PipelineController, PipelineRequest, RunStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn completed_run_leaves_artifact_and_completed_marker() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("docs").join("volcanoes.md");
    let persistence = DurablePersistence::new(&path);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(persistence.error_marker_path(), "failed at earlier run\n").unwrap();
    std::fs::write(persistence.temp_path(), "half a snap").unwrap();

    let controller = PipelineController::new(Arc::new(ScriptedGenerator::new()), fast_config());
    let request = PipelineRequest::new("volcanoes", &path)
        .with_steps(["Magma", "Eruptions"])
        .with_title("Volcanoes")
        .with_sources(["USGS volcano hazards program"]);
    let outcome = controller.run(request).await;

    assert_eq!(outcome.status, RunStatus::Complete);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), outcome.artifact);
    assert!(outcome.artifact.ends_with("## Sources\n\n- USGS volcano hazards program\n"));
    assert_eq!(inspect(&path), ArtifactState::Completed);
    assert!(!persistence.error_marker_path().exists());
    assert!(!persistence.temp_path().exists());
    assert_eq!(
        outcome.report.marker.as_deref(),
        Some(persistence.completed_marker_path().as_path())
    );
    let marker = std::fs::read_to_string(persistence.completed_marker_path()).unwrap();
    assert!(marker.starts_with("completed at "));
}

#[test]
fn crash_between_stage_and_rename_keeps_previous_snapshot() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("doc.md");
    let persistence = DurablePersistence::new(&path);
    persistence.prepare().unwrap();

    persistence.snapshot("# Doc\n\nfirst section\n").unwrap();
    let staged = persistence.stage("# Doc\n\nfirst section\n\nsecond sec").unwrap();
    staged.abandon();

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "# Doc\n\nfirst section\n"
    );
    assert_eq!(inspect(&path), ArtifactState::InProgress);

    // A restart clears the orphaned temp file.
    persistence.prepare().unwrap();
    assert!(!persistence.temp_path().exists());
}

#[test]
fn crash_before_first_rename_leaves_no_artifact() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("doc.md");
    let persistence = DurablePersistence::new(&path);
    persistence.prepare().unwrap();

    persistence.stage("# Doc\n\npartial").unwrap().abandon();

    assert!(!path.exists());
    assert_eq!(inspect(&path), ArtifactState::Missing);
}

#[tokio::test]
async fn unusable_output_path_still_returns_an_artifact() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let path = blocker.join("doc.md");

    let generator = Arc::new(ScriptedGenerator::new());
    let controller = PipelineController::new(generator.clone(), fast_config());
    let outcome = controller
        .run(PipelineRequest::new("glaciers", &path).with_steps(["Ice"]))
        .await;

    assert_eq!(outcome.status, RunStatus::Failed);
    assert!(outcome.artifact.starts_with("# glaciers\n"));
    assert!(outcome
        .report
        .failure_reason
        .as_deref()
        .unwrap()
        .starts_with("persistence setup failed"));
    assert_eq!(generator.calls_for("Ice"), 0);
}

/// Writes through to a real artifact until `good` snapshots have landed, then every
/// write fails as if the disk went away.
struct FailingDisk {
    inner: DurablePersistence,
    good: usize,
    written: Mutex<usize>,
    finalized: Mutex<Vec<bool>>,
}

impl SnapshotStore for FailingDisk {
    fn snapshot(&self, text: &str) -> Result<WriteMode, PersistenceError> {
        let mut written = self.written.lock();
        if *written >= self.good {
            return Err(PersistenceError::Write {
                path: self.inner.path().to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "device lost"),
            });
        }
        *written += 1;
        self.inner.snapshot(text)
    }

    fn finalize(&self, success: bool, _fallback_text: &str) -> Result<PathBuf, PersistenceError> {
        self.finalized.lock().push(success);
        // The artifact cannot be repaired on a lost device; only the sentinel is attempted.
        let marker = self.inner.error_marker_path();
        std::fs::write(&marker, "failed at device loss\n")?;
        Ok(marker)
    }
}

#[tokio::test]
async fn mid_run_write_failure_keeps_last_good_snapshot() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("doc.md");
    let store = FailingDisk {
        inner: DurablePersistence::new(&path),
        good: 1,
        written: Mutex::new(0),
        finalized: Mutex::new(Vec::new()),
    };
    store.inner.prepare().unwrap();

    let generator = Arc::new(ScriptedGenerator::new());
    let controller = PipelineController::new(generator.clone(), fast_config());
    let request = PipelineRequest::new("rivers", &path)
        .with_steps(["Source", "Delta", "Mouth"])
        .with_title("Rivers");

    let outcome = controller.run_with_store(request, &store).await;

    assert_eq!(outcome.status, RunStatus::Failed);
    assert!(outcome.artifact.starts_with("# Rivers\n"));
    assert!(outcome
        .report
        .failure_reason
        .as_deref()
        .unwrap()
        .starts_with("persistence failed"));
    assert_eq!(outcome.report.snapshots_written, 1);
    // Generation stops at the step whose snapshot failed.
    assert_eq!(generator.calls_for("Mouth"), 0);

    let on_disk = std::fs::read_to_string(&path).unwrap();
    assert!(on_disk.contains(&body("Source (rivers)")));
    assert!(!on_disk.contains(&body("Delta (rivers)")));
    assert!(on_disk.contains(scribe::assembly::IN_PROGRESS_PLACEHOLDER));
    assert!(!store.inner.temp_path().exists());

    assert_eq!(*store.finalized.lock(), vec![false]);
    assert_eq!(inspect(&path), ArtifactState::Failed);
}
