//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::PipelineError;

/// Map pipeline errors to a string for CLI output.
/// A failed run already carries its rendered summary.
pub fn map_error(e: &PipelineError) -> String {
    match e {
        PipelineError::RunFailed(summary) => summary.clone(),
        other => format!("error: {}", other),
    }
}
