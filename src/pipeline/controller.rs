//! Pipeline controller: drives one artifact from plan to finalized file.
//! Step failures, stalls and persistence degradation are absorbed here; callers always
//! receive a rendered artifact and a status flag.

use crate::assembly::{
    extract_fenced_code, extract_markers, insert_sub_artifacts, title_suggestions_intro,
    ContentAssembler, SubArtifact,
};
use crate::config::PipelineConfig;
use crate::error::{PersistenceError, PlanError};
use crate::generation::{GenerationPolicy, SectionGenerator, StepGenerator};
use crate::persistence::{DurablePersistence, SnapshotStore, WriteMode};
use crate::pipeline::{
    CancelHandle, PipelineContext, PipelineOutcome, PipelineRequest, PipelineState, RunReport,
    RunStatus, StepSummary,
};
use crate::plan::{
    default_structure, parse_outline, parse_title_suggestions, InMemoryReporter, Plan,
    PlanTracker, ProgressReporter, Step, StepStatus,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Generator request for a section outline.
pub fn outline_request(topic: &str) -> String {
    format!(
        "Outline the sections of a document about: {}. Respond with a JSON list of section titles.",
        topic.trim()
    )
}

/// Generator request for title suggestions.
pub fn title_request(topic: &str) -> String {
    format!(
        "Suggest 3 to 5 titles for a document about: {}. Respond with a JSON list of strings.",
        topic.trim()
    )
}

/// Generator request for a sub-artifact body.
pub fn sub_artifact_request(description: &str) -> String {
    format!(
        "Write code for a visualization of: {}. Respond with one fenced code block, or SKIP.",
        description.trim()
    )
}

/// Static description of one section; also the base of its fallback content.
pub fn section_description(topic: &str, title: &str, audience: Option<&str>) -> String {
    match audience.map(str::trim).filter(|a| !a.is_empty()) {
        Some(audience) => format!("{} ({}, for a {} audience)", title, topic.trim(), audience),
        None => format!("{} ({})", title, topic.trim()),
    }
}

/// Result of planning and title selection, without generating sections.
#[derive(Debug, Clone)]
pub struct PlanPreview {
    pub plan: Plan,
    pub title: String,
    pub title_suggestions: Vec<String>,
    pub used_default_structure: bool,
}

pub struct PipelineController {
    sections: SectionGenerator,
    config: PipelineConfig,
    reporter: Option<Arc<dyn ProgressReporter>>,
    cancel: CancelHandle,
}

impl PipelineController {
    pub fn new(generator: Arc<dyn StepGenerator>, config: PipelineConfig) -> Self {
        let policy = GenerationPolicy::from(&config);
        Self {
            sections: SectionGenerator::new(generator, policy),
            config,
            reporter: None,
            cancel: CancelHandle::new(),
        }
    }

    /// Uses an external reporter instead of a per-run in-process one.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the pipeline, persisting to `request.output_path`.
    pub async fn run(&self, request: PipelineRequest) -> PipelineOutcome {
        let persistence = DurablePersistence::new(&request.output_path);
        let ctx = match persistence.prepare() {
            Ok(()) => PipelineContext::new(),
            Err(err) => {
                error!(path = %request.output_path.display(), error = %err, "Output path unusable");
                PipelineContext::new().fail(format!("persistence setup failed: {}", err))
            }
        };
        self.execute(request, &persistence, ctx).await
    }

    /// Runs the pipeline against a caller-supplied store.
    pub async fn run_with_store(
        &self,
        request: PipelineRequest,
        store: &dyn SnapshotStore,
    ) -> PipelineOutcome {
        self.execute(request, store, PipelineContext::new()).await
    }

    /// Planning and title selection only.
    pub async fn preview(&self, request: &PipelineRequest) -> Result<PlanPreview, PlanError> {
        let (plan, used_default_structure) = self.plan_steps(request).await?;
        let (title, title_suggestions) = self.choose_title(request).await;
        Ok(PlanPreview {
            plan,
            title,
            title_suggestions,
            used_default_structure,
        })
    }

    async fn execute(
        &self,
        request: PipelineRequest,
        store: &dyn SnapshotStore,
        mut ctx: PipelineContext,
    ) -> PipelineOutcome {
        let mut snapshots = SnapshotLedger::new(store);
        info!(topic = %request.topic, path = %request.output_path.display(), "Generation started");
        let mut assembler = ContentAssembler::new(request.topic.trim());

        // Planning. Setup failures skip straight to finalization.
        let mut tracker = None;
        if ctx.is_healthy() {
            match self.plan_steps(&request).await {
                Ok((plan, used_default)) => {
                    info!(
                        total_steps = plan.total_steps(),
                        default_structure = used_default,
                        "Plan ready"
                    );
                    tracker = Some(PlanTracker::new(plan, self.config.stall_repeat_threshold));
                    ctx = enter(ctx, PipelineState::GeneratingTitles);
                }
                Err(err) => {
                    error!(error = %err, "Planning failed");
                    ctx = ctx.fail(format!("planning failed: {}", err));
                }
            }
        }

        if let Some(tracker) = tracker.as_mut().filter(|_| ctx.is_healthy()) {
            let (title, suggestions) = self.choose_title(&request).await;
            assembler.set_title(title);
            assembler.set_intro(title_suggestions_intro(&suggestions));
            ctx = enter(ctx, PipelineState::GeneratingStructure);

            assembler.set_structure(
                tracker
                    .plan()
                    .steps()
                    .iter()
                    .map(|step| (step.index, step.title.as_str())),
            );
            for source in &request.sources {
                assembler.add_source(source.clone());
            }
            ctx = enter(ctx, PipelineState::GeneratingSections);

            ctx = self
                .generate_sections(ctx, tracker, &mut assembler, &mut snapshots)
                .await;
        }

        self.finalize(ctx, tracker, assembler, snapshots, request).await
    }

    async fn generate_sections(
        &self,
        mut ctx: PipelineContext,
        tracker: &mut PlanTracker,
        assembler: &mut ContentAssembler,
        snapshots: &mut SnapshotLedger<'_>,
    ) -> PipelineContext {
        let total = tracker.total_steps();
        let threshold = self.config.effective_failure_threshold(total);
        let stall_threshold = self.config.stall_repeat_threshold.max(1) as usize;
        // Each step can be polled at most `stall_threshold` times before it is forced.
        let max_iterations = total
            .saturating_mul(stall_threshold.saturating_add(1))
            .saturating_add(1);
        let reporter: Arc<dyn ProgressReporter> = match &self.reporter {
            Some(reporter) => reporter.clone(),
            None => Arc::new(InMemoryReporter::for_plan(tracker.plan())),
        };

        loop {
            if self.cancel.is_cancelled() {
                warn!(completed = tracker.plan().count(StepStatus::Completed), "Generation cancelled");
                ctx = ctx.cancel();
                break;
            }

            let report = reporter.progress_text().await;
            let Some(index) = tracker.resolve(report) else {
                debug!("Plan exhausted");
                break;
            };

            ctx = ctx.record_iteration();
            if ctx.iterations() > max_iterations {
                error!(iterations = ctx.iterations(), "Iteration limit exceeded");
                ctx = ctx.fail("iteration limit exceeded");
                break;
            }

            let open = tracker
                .step(index)
                .map(|step| !step.status.is_terminal())
                .unwrap_or(false);
            if open {
                let (next_ctx, persisted) = self
                    .run_step(ctx, tracker, assembler, reporter.as_ref(), snapshots, index)
                    .await;
                ctx = next_ctx;
                if !persisted {
                    break;
                }
                if ctx.threshold_reached(threshold) {
                    error!(
                        consecutive_failures = ctx.consecutive_failures(),
                        failure_threshold = threshold,
                        "Failure threshold reached; stopping generation"
                    );
                    let failures = ctx.consecutive_failures();
                    ctx = ctx.fail(format!(
                        "{} consecutive step failures (threshold {})",
                        failures, threshold
                    ));
                    break;
                }
            }

            if tracker.observe_and_detect_stall(index) {
                warn!(
                    step_index = index,
                    repeat_count = tracker.stall_state().repeat_count,
                    "Progress stalled; forcing advance"
                );
                match tracker.force_advance(index) {
                    Ok(_) => {
                        if tracker.step(index).map(|s| s.status) == Some(StepStatus::Skipped) {
                            assembler.mark_skipped(index);
                        }
                        ctx = ctx.record_stall();
                    }
                    Err(err) => {
                        error!(step_index = index, error = %err, "Forced advance failed");
                        ctx = ctx.fail(err.to_string());
                        break;
                    }
                }
            }
        }
        ctx
    }

    /// Generates, assembles and snapshots one step. The flag is false when the
    /// snapshot could not be persisted at all.
    async fn run_step(
        &self,
        mut ctx: PipelineContext,
        tracker: &mut PlanTracker,
        assembler: &mut ContentAssembler,
        reporter: &dyn ProgressReporter,
        snapshots: &mut SnapshotLedger<'_>,
        index: usize,
    ) -> (PipelineContext, bool) {
        let step: Step = match tracker.begin(index) {
            Ok(step) => step.clone(),
            Err(err) => {
                warn!(step_index = index, error = %err, "Cannot start step");
                return (ctx, true);
            }
        };
        info!(step_index = index, title = %step.title, total_steps = tracker.total_steps(), "Section started");

        let prior_context = assembler.prior_context(self.config.prior_context_chars);
        let attempt = self.sections.generate(&step, &prior_context).await;
        ctx = ctx.record_attempts(attempt.attempt_number);
        let retry_count = attempt.retry_count();

        let status = if attempt.is_success() {
            let text = self.attach_sub_artifacts(attempt.into_text()).await;
            if let Err(err) = tracker.complete(index, text.clone(), retry_count) {
                warn!(step_index = index, error = %err, "Could not record completed step");
            }
            assembler.append_section(index, text);
            ctx = ctx.record_success();
            StepStatus::Completed
        } else {
            let fallback = attempt.into_text();
            if let Err(err) = tracker.fail(index, fallback.clone(), retry_count) {
                warn!(step_index = index, error = %err, "Could not record failed step");
            }
            assembler.append_section(index, fallback);
            ctx = ctx.record_failure();
            StepStatus::Failed
        };

        if let Err(err) = reporter.mark_step(index, status).await {
            debug!(step_index = index, error = %err, "Reporter did not accept step status");
        }

        match snapshots.write(assembler.render_snapshot()) {
            Ok(mode) => {
                ctx = ctx.record_snapshot(mode);
                info!(
                    step_index = index,
                    status = status.as_str(),
                    retry_count,
                    snapshots = ctx.snapshots_written(),
                    "Section finished"
                );
                (ctx, true)
            }
            Err(err) => {
                error!(step_index = index, error = %err, "Snapshot failed");
                (ctx.fail(format!("persistence failed: {}", err)), false)
            }
        }
    }

    async fn finalize(
        &self,
        ctx: PipelineContext,
        tracker: Option<PlanTracker>,
        mut assembler: ContentAssembler,
        mut snapshots: SnapshotLedger<'_>,
        request: PipelineRequest,
    ) -> PipelineOutcome {
        let mut ctx = enter(ctx, PipelineState::Finalizing);

        let plan = tracker.map(|mut tracker| {
            for index in tracker.skip_open_steps() {
                assembler.mark_skipped(index);
            }
            tracker.into_plan()
        });

        let artifact = assembler.render();

        // After a failed write the target keeps the last good snapshot.
        if !snapshots.has_failed() && !snapshots.is_current(&artifact) {
            match snapshots.write(artifact.clone()) {
                Ok(mode) => ctx = ctx.record_snapshot(mode),
                Err(err) => {
                    error!(error = %err, "Final snapshot failed");
                    ctx = ctx.fail(format!("persistence failed: {}", err));
                }
            }
        }

        let success = ctx.is_healthy();
        let marker = match snapshots.store().finalize(success, &artifact) {
            Ok(marker) => Some(marker),
            Err(err) => {
                error!(error = %err, "Finalization failed");
                ctx = ctx.fail(format!("persistence failed: {}", err));
                None
            }
        };
        let success = success && ctx.is_healthy();
        let ctx = enter(
            ctx,
            if success {
                PipelineState::Done
            } else {
                PipelineState::Failed
            },
        );

        let steps: Vec<StepSummary> = plan
            .as_ref()
            .map(|plan| {
                plan.steps()
                    .iter()
                    .map(|step| StepSummary {
                        index: step.index,
                        title: step.title.clone(),
                        status: step.status,
                        retry_count: step.retry_count,
                    })
                    .collect()
            })
            .unwrap_or_default();
        let all_completed = !steps.is_empty()
            && steps.iter().all(|s| s.status == StepStatus::Completed);
        let status = if !success {
            RunStatus::Failed
        } else if all_completed && !ctx.persistence_degraded() {
            RunStatus::Complete
        } else {
            RunStatus::Degraded
        };

        let report = RunReport {
            title: assembler.artifact().title.clone(),
            final_state: ctx.state(),
            steps,
            attempts: ctx.attempts(),
            failures: ctx.total_failures(),
            stalls_corrected: ctx.stalls_corrected(),
            snapshots_written: ctx.snapshots_written(),
            persistence_degraded: ctx.persistence_degraded(),
            cancelled: ctx.is_cancelled(),
            failure_reason: ctx.failure_reason().map(str::to_string),
            marker,
        };
        info!(
            status = status.as_str(),
            final_state = ctx.state().as_str(),
            snapshots = report.snapshots_written,
            failures = report.failures,
            stalls = report.stalls_corrected,
            "Generation finished"
        );

        PipelineOutcome {
            status,
            artifact,
            output_path: request.output_path,
            report,
        }
    }

    /// Caller-supplied steps, else a generated outline, else the default structure.
    async fn plan_steps(&self, request: &PipelineRequest) -> Result<(Plan, bool), PlanError> {
        let mut titles: Vec<String> = request
            .steps
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let mut used_default = false;

        if titles.is_empty() {
            match self
                .sections
                .request_once(&outline_request(&request.topic), "")
                .await
            {
                Ok(text) => match parse_outline(&text) {
                    Some(outline) => titles = outline,
                    None => warn!("Outline response unusable; using default structure"),
                },
                Err(err) => warn!(error = %err, "Outline generation failed; using default structure"),
            }
        }
        if titles.is_empty() {
            titles = default_structure();
            used_default = true;
        }

        let steps: Vec<Step> = titles
            .iter()
            .enumerate()
            .map(|(index, title)| {
                Step::new(index, title.as_str()).with_description(section_description(
                    &request.topic,
                    title,
                    request.audience.as_deref(),
                ))
            })
            .collect();
        Ok((Plan::from_steps(steps)?, used_default))
    }

    async fn choose_title(&self, request: &PipelineRequest) -> (String, Vec<String>) {
        if let Some(title) = request.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return (title.to_string(), vec![title.to_string()]);
        }
        let suggestions = match self
            .sections
            .request_once(&title_request(&request.topic), "")
            .await
        {
            Ok(text) => parse_title_suggestions(&text, &request.topic),
            Err(err) => {
                warn!(error = %err, "Title generation failed; using topic");
                vec![request.topic.trim().to_string()]
            }
        };
        let title = suggestions
            .first()
            .cloned()
            .unwrap_or_else(|| request.topic.trim().to_string());
        (title, suggestions)
    }

    /// Strips visualization markers and inserts a generated block for each one.
    /// A marker whose generation fails is dropped; its anchor text stays.
    async fn attach_sub_artifacts(&self, text: String) -> String {
        let (cleaned, markers) = extract_markers(&text);
        if markers.is_empty() || !self.config.sub_artifacts {
            return cleaned;
        }

        let mut sub_artifacts = Vec::new();
        for marker in markers {
            match self
                .sections
                .request_once(&sub_artifact_request(&marker.description), &marker.anchor_text)
                .await
            {
                Ok(response) => match extract_fenced_code(&response) {
                    Some(body) => sub_artifacts.push(SubArtifact::new(
                        marker.description,
                        marker.anchor_text,
                        body,
                    )),
                    None => debug!(description = %marker.description, "Sub-artifact skipped"),
                },
                Err(err) => {
                    warn!(description = %marker.description, error = %err, "Sub-artifact generation failed")
                }
            }
        }
        insert_sub_artifacts(&cleaned, &sub_artifacts)
    }
}

/// Snapshot store plus what was last handed to it.
struct SnapshotLedger<'a> {
    store: &'a dyn SnapshotStore,
    last: Option<String>,
    failed: bool,
}

impl<'a> SnapshotLedger<'a> {
    fn new(store: &'a dyn SnapshotStore) -> Self {
        Self {
            store,
            last: None,
            failed: false,
        }
    }

    fn store(&self) -> &'a dyn SnapshotStore {
        self.store
    }

    fn write(&mut self, text: String) -> Result<WriteMode, PersistenceError> {
        match self.store.snapshot(&text) {
            Ok(mode) => {
                self.last = Some(text);
                Ok(mode)
            }
            Err(err) => {
                self.failed = true;
                Err(err)
            }
        }
    }

    /// True when `text` is exactly what the last successful snapshot wrote.
    fn is_current(&self, text: &str) -> bool {
        self.last.as_deref() == Some(text)
    }

    fn has_failed(&self) -> bool {
        self.failed
    }
}

/// Applies a state transition; an illegal one is recorded as a run failure and the
/// context stays where it was.
fn enter(ctx: PipelineContext, next: PipelineState) -> PipelineContext {
    match ctx.clone().transition(next) {
        Ok(ctx) => {
            debug!(state = next.as_str(), "Pipeline state");
            ctx
        }
        Err(err) => {
            error!(error = %err, "Pipeline state machine violation");
            ctx.fail(err.to_string())
        }
    }
}
