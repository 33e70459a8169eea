//! Merge rules: defaults that every later source overrides.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("output.directory", "output")?
        .set_default("output.cache_dir", ".scribe/cache")?
        .set_default("provider.endpoint", "http://localhost:11434/v1")?
        .set_default("provider.model", "llama3")
}
