//! CLI parse: clap types for Scribe. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Scribe CLI - staged long-form content generation
#[derive(Parser)]
#[command(name = "scribe")]
#[command(about = "Generate long-form documents section by section with durable snapshots")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a document for a topic
    Generate {
        /// Topic of the document
        topic: String,
        /// Section title, in order (repeatable). Omit to let the generator outline.
        #[arg(long = "step")]
        steps: Vec<String>,
        /// Working title. Omit to let the generator suggest one.
        #[arg(long)]
        title: Option<String>,
        /// Output path (default: <output.directory>/script_<topic>_<timestamp>.md)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Bypass the generation cache
        #[arg(long)]
        no_cache: bool,
        /// Intended audience (e.g. beginner, expert)
        #[arg(long)]
        audience: Option<String>,
        /// Source reference listed at the end of the document (repeatable)
        #[arg(long = "source")]
        sources: Vec<String>,
    },
    /// Plan a document without generating sections
    Plan {
        /// Topic of the document
        topic: String,
        /// Section title, in order (repeatable)
        #[arg(long = "step")]
        steps: Vec<String>,
        /// Intended audience
        #[arg(long)]
        audience: Option<String>,
    },
    /// Inspect an artifact path and its completion sentinels
    Status {
        /// Artifact path
        path: PathBuf,
    },
    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Load and validate configuration
    Validate,
    /// Print the effective configuration as TOML
    Show,
}
