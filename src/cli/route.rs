//! CLI route: single route table and run context. Dispatches to the pipeline and presentation.

use crate::assembly::{IN_PROGRESS_PLACEHOLDER, SKIPPED_PLACEHOLDER};
use crate::cli::parse::{Commands, ConfigCommands};
use crate::cli::presentation::{
    format_config_validation, format_plan_preview, format_run_outcome, format_status,
};
use crate::config::{ConfigLoader, ScribeConfig};
use crate::error::{ConfigError, PersistenceError, PipelineError};
use crate::generation::cache::CachedGenerator;
use crate::generation::http::HttpGenerator;
use crate::generation::StepGenerator;
use crate::persistence::inspect;
use crate::pipeline::{default_output_path, PipelineController, PipelineRequest, RunStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Command name string for logs (e.g. "generate", "config.validate").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Generate { .. } => "generate",
        Commands::Plan { .. } => "plan",
        Commands::Status { .. } => "status",
        Commands::Config {
            command: ConfigCommands::Validate,
        } => "config.validate",
        Commands::Config {
            command: ConfigCommands::Show,
        } => "config.show",
    }
}

/// Runtime context for CLI execution: workspace, config path, and loaded configuration.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    workspace_root: PathBuf,
    config_path: Option<PathBuf>,
    config: ScribeConfig,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, PipelineError> {
        let config = ConfigLoader::load_with_override(&workspace_root, config_path.as_deref())?;
        Ok(Self {
            workspace_root,
            config_path,
            config,
        })
    }

    pub fn config(&self) -> &ScribeConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Execute a command and return its text output. A run that ends in the failed
    /// state is an error carrying the same summary.
    pub async fn execute(&self, command: &Commands) -> Result<String, PipelineError> {
        let started = Instant::now();
        let name = command_name(command);
        debug!(command = name, "Dispatching command");

        let result = match command {
            Commands::Generate {
                topic,
                steps,
                title,
                output,
                no_cache,
                audience,
                sources,
            } => {
                let mut request = PipelineRequest::new(
                    topic.as_str(),
                    self.output_path(output.as_deref(), topic),
                )
                .with_steps(steps.iter().cloned())
                .with_sources(sources.iter().cloned());
                if let Some(title) = title {
                    request = request.with_title(title.as_str());
                }
                if let Some(audience) = audience {
                    request = request.with_audience(audience.as_str());
                }
                self.handle_generate(request, *no_cache).await
            }
            Commands::Plan {
                topic,
                steps,
                audience,
            } => {
                let mut request = PipelineRequest::new(topic.as_str(), PathBuf::new())
                    .with_steps(steps.iter().cloned());
                if let Some(audience) = audience {
                    request = request.with_audience(audience.as_str());
                }
                self.handle_plan(request).await
            }
            Commands::Status { path } => self.handle_status(path),
            Commands::Config {
                command: ConfigCommands::Validate,
            } => self.handle_config_validate(),
            Commands::Config {
                command: ConfigCommands::Show,
            } => self.handle_config_show(),
        };

        info!(
            command = name,
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    async fn handle_generate(
        &self,
        request: PipelineRequest,
        no_cache: bool,
    ) -> Result<String, PipelineError> {
        self.ensure_valid()?;
        let generator = self.build_generator(no_cache)?;
        let controller = PipelineController::new(generator, self.config.pipeline.clone());
        let outcome = controller.run(request).await;
        let text = format_run_outcome(&outcome);
        if outcome.status == RunStatus::Failed {
            return Err(PipelineError::RunFailed(text));
        }
        Ok(text)
    }

    async fn handle_plan(&self, request: PipelineRequest) -> Result<String, PipelineError> {
        self.ensure_valid()?;
        let generator = self.build_generator(false)?;
        let controller = PipelineController::new(generator, self.config.pipeline.clone());
        let preview = controller.preview(&request).await?;
        Ok(format_plan_preview(&preview))
    }

    fn handle_status(&self, path: &Path) -> Result<String, PipelineError> {
        let path = self.resolve(path);
        let state = inspect(&path);
        let placeholders = if path.is_file() {
            let text = std::fs::read_to_string(&path).map_err(|source| PersistenceError::Read {
                path: path.clone(),
                source,
            })?;
            text.matches(IN_PROGRESS_PLACEHOLDER).count()
                + text.matches(SKIPPED_PLACEHOLDER).count()
        } else {
            0
        };
        Ok(format_status(&path, state, placeholders))
    }

    fn handle_config_validate(&self) -> Result<String, PipelineError> {
        let source = match self.config_path {
            Some(ref path) => path.display().to_string(),
            None => format!("workspace {}", self.workspace_root.display()),
        };
        let result = self.config.validate();
        let text = format_config_validation(&source, &result);
        match result {
            Ok(()) => Ok(text),
            Err(_) => Err(PipelineError::Config(ConfigError::Invalid(text))),
        }
    }

    fn handle_config_show(&self) -> Result<String, PipelineError> {
        toml::to_string_pretty(&self.config)
            .map_err(|e| PipelineError::Config(ConfigError::Invalid(e.to_string())))
    }

    fn ensure_valid(&self) -> Result<(), PipelineError> {
        self.config.validate().map_err(|errors| {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            PipelineError::Config(ConfigError::Invalid(joined))
        })
    }

    fn build_generator(&self, no_cache: bool) -> Result<Arc<dyn StepGenerator>, PipelineError> {
        let http = HttpGenerator::from_config(&self.config.provider)?;
        if no_cache {
            return Ok(Arc::new(http));
        }
        let cache_dir = self.resolve(&self.config.output.cache_dir);
        debug!(cache_dir = %cache_dir.display(), "Generation cache enabled");
        Ok(Arc::new(
            CachedGenerator::new(http, cache_dir)
                .with_min_length(self.config.pipeline.min_acceptable_content_length),
        ))
    }

    fn output_path(&self, explicit: Option<&Path>, topic: &str) -> PathBuf {
        match explicit {
            Some(path) => self.resolve(path),
            None => default_output_path(&self.resolve(&self.config.output.directory), topic),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }
}
