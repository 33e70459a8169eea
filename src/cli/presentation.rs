//! CLI presentation: text output for run outcomes, plan previews, status and config checks.

use crate::config::ValidationError;
use crate::persistence::ArtifactState;
use crate::pipeline::{PipelineOutcome, PlanPreview};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use std::path::Path;

pub fn format_run_outcome(outcome: &PipelineOutcome) -> String {
    let report = &outcome.report;
    let mut out = format!("Title: {}\n", report.title);
    out.push_str(&format!("Status: {}\n", outcome.status.as_str()));
    out.push_str(&format!("Output: {}\n\n", outcome.output_path.display()));

    if !report.steps.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["#", "Section", "Status", "Retries"]);
        for step in &report.steps {
            table.add_row(vec![
                (step.index + 1).to_string(),
                step.title.clone(),
                step.status.as_str().to_string(),
                step.retry_count.to_string(),
            ]);
        }
        out.push_str(&format!("{}\n\n", table));
    }

    out.push_str(&format!(
        "Attempts: {}  Failures: {}  Stalls corrected: {}  Snapshots: {}\n",
        report.attempts, report.failures, report.stalls_corrected, report.snapshots_written
    ));
    if report.persistence_degraded {
        out.push_str("Warning: some snapshots were written non-atomically\n");
    }
    if report.cancelled {
        out.push_str("Run was cancelled\n");
    }
    if let Some(ref reason) = report.failure_reason {
        out.push_str(&format!("Failure: {}\n", reason));
    }
    out
}

pub fn format_plan_preview(preview: &PlanPreview) -> String {
    let mut out = format!("Title: {}\n", preview.title);
    if preview.title_suggestions.len() > 1 {
        out.push_str("Suggestions:\n");
        for suggestion in &preview.title_suggestions {
            out.push_str(&format!("  - {}\n", suggestion));
        }
    }
    if preview.used_default_structure {
        out.push_str("(default structure)\n");
    }
    out.push('\n');
    out.push_str(&preview.plan.render_checklist());
    out
}

/// `placeholders` is the number of unfinished-section markers left in the file.
pub fn format_status(path: &Path, state: ArtifactState, placeholders: usize) -> String {
    let mut out = format!("Artifact: {}\n", path.display());
    out.push_str(&format!("State: {}\n", state.as_str()));
    if state != ArtifactState::Missing {
        out.push_str(&format!("Placeholders remaining: {}\n", placeholders));
    }
    out
}

pub fn format_config_validation(
    source: &str,
    result: &Result<(), Vec<ValidationError>>,
) -> String {
    match result {
        Ok(()) => format!("Configuration valid ({})", source),
        Err(errors) => {
            let mut out = format!("Configuration invalid ({}):\n", source);
            for error in errors {
                out.push_str(&format!("  - {}\n", error));
            }
            out
        }
    }
}
