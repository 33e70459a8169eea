//! Shared test utilities for integration tests
//!
//! Scripted generators and a recording snapshot store, so pipeline runs are
//! deterministic and observable without a provider or a filesystem.

use async_trait::async_trait;
use parking_lot::Mutex;
use scribe::config::PipelineConfig;
use scribe::error::{GenerationError, PersistenceError};
use scribe::generation::StepGenerator;
use scribe::persistence::{SnapshotStore, WriteMode};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

pub const FIVE_STEPS: [&str; 5] = ["Intro", "Background", "Core", "Applications", "Summary"];

/// Body long enough to pass the default minimum length.
pub fn body(label: &str) -> String {
    format!(
        "{} section body with enough generated prose to clear the minimum length check.",
        label
    )
}

/// Pipeline settings with no retry delay.
pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        retry_delay_ms: 0,
        sub_artifacts: false,
        ..PipelineConfig::default()
    }
}

/// Generator answering by keyword. A keyword with a script answers from it until
/// the script runs dry; a keyword listed as failing always errors. Anything else
/// gets `body(step description)`.
#[derive(Default)]
pub struct ScriptedGenerator {
    scripts: Mutex<HashMap<String, VecDeque<Result<String, GenerationError>>>>,
    failing: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, keyword: &str, responses: Vec<Result<String, GenerationError>>) -> Self {
        self.scripts
            .lock()
            .insert(keyword.to_string(), responses.into_iter().collect());
        self
    }

    pub fn always_failing(mut self, keyword: &str) -> Self {
        self.failing.push(keyword.to_string());
        self
    }

    /// Calls whose step description contains `keyword`.
    pub fn calls_for(&self, keyword: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|description| description.contains(keyword))
            .count()
    }
}

#[async_trait]
impl StepGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        step_description: &str,
        _prior_context: &str,
    ) -> Result<String, GenerationError> {
        self.calls.lock().push(step_description.to_string());
        if self
            .failing
            .iter()
            .any(|keyword| step_description.contains(keyword.as_str()))
        {
            return Err(GenerationError::RequestFailed("provider down".to_string()));
        }
        let mut scripts = self.scripts.lock();
        for (keyword, responses) in scripts.iter_mut() {
            if step_description.contains(keyword.as_str()) {
                if let Some(response) = responses.pop_front() {
                    return response;
                }
            }
        }
        Ok(body(step_description))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Snapshot(String),
    Finalize(bool),
}

/// Snapshot store that records every call in order.
#[derive(Default)]
pub struct RecordingStore {
    events: Mutex<Vec<StoreEvent>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StoreEvent> {
        self.events.lock().clone()
    }

    pub fn snapshots(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                StoreEvent::Snapshot(text) => Some(text),
                StoreEvent::Finalize(_) => None,
            })
            .collect()
    }
}

impl SnapshotStore for RecordingStore {
    fn snapshot(&self, text: &str) -> Result<WriteMode, PersistenceError> {
        self.events.lock().push(StoreEvent::Snapshot(text.to_string()));
        Ok(WriteMode::Atomic)
    }

    fn finalize(&self, success: bool, _fallback_text: &str) -> Result<PathBuf, PersistenceError> {
        self.events.lock().push(StoreEvent::Finalize(success));
        Ok(PathBuf::from(if success {
            "recorded.completed"
        } else {
            "recorded.error"
        }))
    }
}
