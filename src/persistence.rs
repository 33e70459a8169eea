//! Durable snapshot persistence for the artifact being generated.
//!
//! Snapshots are written to a sibling temp file and renamed over the target, so a
//! reader never observes a half-written artifact. When the atomic path fails the
//! target is written directly, with a warning. Completion is signalled with a
//! `<path>.completed` or `<path>.error` sentinel holding one timestamp line.

use crate::assembly::IN_PROGRESS_PLACEHOLDER;
use crate::error::PersistenceError;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

const TEMP_SUFFIX: &str = ".tmp";
const COMPLETED_SUFFIX: &str = ".completed";
const ERROR_SUFFIX: &str = ".error";

/// How a snapshot reached disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Atomic,
    /// Temp write or rename failed; the target was overwritten in place.
    Direct,
}

/// Write contract used by the pipeline. Owns no artifact data.
pub trait SnapshotStore: Send + Sync {
    fn snapshot(&self, text: &str) -> Result<WriteMode, PersistenceError>;

    /// Writes the completion or error sentinel. If the target is missing or still holds
    /// an in-progress placeholder, `fallback_text` is written first.
    fn finalize(&self, success: bool, fallback_text: &str) -> Result<PathBuf, PersistenceError>;
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[derive(Debug, Clone)]
pub struct DurablePersistence {
    path: PathBuf,
}

impl DurablePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn temp_path(&self) -> PathBuf {
        with_suffix(&self.path, TEMP_SUFFIX)
    }

    pub fn completed_marker_path(&self) -> PathBuf {
        with_suffix(&self.path, COMPLETED_SUFFIX)
    }

    pub fn error_marker_path(&self) -> PathBuf {
        with_suffix(&self.path, ERROR_SUFFIX)
    }

    /// Creates the parent directory and clears sentinels and temp files left by a
    /// previous run at the same path.
    pub fn prepare(&self) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| PersistenceError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        for stale in [
            self.completed_marker_path(),
            self.error_marker_path(),
            self.temp_path(),
        ] {
            if stale.is_file() {
                fs::remove_file(&stale).map_err(|source| PersistenceError::Write {
                    path: stale.clone(),
                    source,
                })?;
                debug!(path = %stale.display(), "Removed stale file");
            }
        }
        Ok(())
    }

    /// Writes `text` to the temp path and syncs it, without touching the target.
    pub fn stage(&self, text: &str) -> Result<StagedSnapshot, PersistenceError> {
        let temp = self.temp_path();
        let write = || -> std::io::Result<()> {
            let mut file = File::create(&temp)?;
            file.write_all(text.as_bytes())?;
            file.sync_all()
        };
        if let Err(source) = write() {
            // Only remove a temp *file*; anything else at that path is not ours.
            if temp.is_file() {
                let _ = fs::remove_file(&temp);
            }
            return Err(PersistenceError::Write { path: temp, source });
        }
        Ok(StagedSnapshot {
            temp,
            target: self.path.clone(),
        })
    }

    fn write_direct(&self, text: &str) -> Result<(), PersistenceError> {
        fs::write(&self.path, text).map_err(|source| PersistenceError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn write_marker(&self, marker: &Path, label: &str) -> Result<(), PersistenceError> {
        let line = format!("{} at {}\n", label, chrono::Utc::now().to_rfc3339());
        fs::write(marker, line).map_err(|source| PersistenceError::Write {
            path: marker.to_path_buf(),
            source,
        })
    }

    fn needs_fallback(&self) -> Result<bool, PersistenceError> {
        match fs::read_to_string(&self.path) {
            Ok(current) => Ok(current.contains(IN_PROGRESS_PLACEHOLDER)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(source) => Err(PersistenceError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

impl SnapshotStore for DurablePersistence {
    fn snapshot(&self, text: &str) -> Result<WriteMode, PersistenceError> {
        match self.stage(text).and_then(StagedSnapshot::commit) {
            Ok(()) => Ok(WriteMode::Atomic),
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "Atomic snapshot failed; writing target directly"
                );
                self.write_direct(text)?;
                Ok(WriteMode::Direct)
            }
        }
    }

    fn finalize(&self, success: bool, fallback_text: &str) -> Result<PathBuf, PersistenceError> {
        let repaired = self.needs_fallback().and_then(|needed| {
            if needed {
                warn!(path = %self.path.display(), "Artifact incomplete at finalization; writing fallback");
                self.snapshot(fallback_text)?;
            }
            Ok(())
        });
        if let Err(err) = repaired {
            // The artifact is unusable; watchers still get the error sentinel.
            error!(path = %self.path.display(), error = %err, "Artifact could not be finalized");
            let _ = fs::remove_file(self.completed_marker_path());
            if let Err(marker_err) = self.write_marker(&self.error_marker_path(), "failed") {
                error!(error = %marker_err, "Error sentinel could not be written");
            }
            return Err(err);
        }

        let (marker, stale, label) = if success {
            (self.completed_marker_path(), self.error_marker_path(), "completed")
        } else {
            (self.error_marker_path(), self.completed_marker_path(), "failed")
        };
        if stale.is_file() {
            let _ = fs::remove_file(&stale);
        }
        self.write_marker(&marker, label)?;
        Ok(marker)
    }
}

/// A snapshot written to the temp path but not yet visible at the target.
#[derive(Debug)]
pub struct StagedSnapshot {
    temp: PathBuf,
    target: PathBuf,
}

impl StagedSnapshot {
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// Renames the temp file over the target.
    pub fn commit(self) -> Result<(), PersistenceError> {
        fs::rename(&self.temp, &self.target).map_err(|source| {
            let _ = fs::remove_file(&self.temp);
            PersistenceError::Rename {
                from: self.temp.clone(),
                to: self.target.clone(),
                source,
            }
        })
    }

    /// Drops the snapshot without renaming, as an interrupted write would. The temp
    /// file stays on disk until the next `prepare`.
    pub fn abandon(self) {}
}

/// Sentinel state of an artifact path, as seen by an outside observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    Missing,
    InProgress,
    Completed,
    Failed,
}

impl ArtifactState {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactState::Missing => "missing",
            ArtifactState::InProgress => "in progress",
            ArtifactState::Completed => "completed",
            ArtifactState::Failed => "failed",
        }
    }
}

/// Inspects an artifact path and its sentinels.
pub fn inspect(path: &Path) -> ArtifactState {
    let persistence = DurablePersistence::new(path);
    if persistence.error_marker_path().is_file() {
        ArtifactState::Failed
    } else if persistence.completed_marker_path().is_file() {
        ArtifactState::Completed
    } else if path.is_file() {
        ArtifactState::InProgress
    } else {
        ArtifactState::Missing
    }
}
