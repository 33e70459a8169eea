//! Config loader: assembles sources in precedence order and deserializes the result.

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::ScribeConfig;
use crate::error::ConfigError;
use config::{Environment, File};
use std::path::{Path, PathBuf};

/// Environment overrides use `SCRIBE__SECTION__KEY`, e.g. `SCRIBE__PIPELINE__STEP_TIMEOUT_SECS`.
const ENV_PREFIX: &str = "SCRIBE";
const ENV_SEPARATOR: &str = "__";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (lowest to highest): defaults, global file, workspace files, environment.
    pub fn load(workspace_root: &Path) -> Result<ScribeConfig, ConfigError> {
        Self::load_with_override(workspace_root, None)
    }

    /// Like [`ConfigLoader::load`], with an explicit file applied last.
    pub fn load_with_override(
        workspace_root: &Path,
        explicit: Option<&Path>,
    ) -> Result<ScribeConfig, ConfigError> {
        let mut builder = merge_policy::builder_with_defaults()?;
        builder = global_file::add_to_builder(builder)?;
        builder = workspace_file::add_to_builder(builder, workspace_root)?;
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(ConfigError::Load(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: ScribeConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Load a single file on top of defaults, ignoring every other source.
    pub fn load_from_file(path: &Path) -> Result<ScribeConfig, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::Load(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let config: ScribeConfig = merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Built-in defaults with no sources applied.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> ScribeConfig {
        ScribeConfig::default()
    }

    /// Path of the global user config file, if HOME is known.
    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}
