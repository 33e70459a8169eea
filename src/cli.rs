//! CLI domain: parse, route, output, and presentation only.
//! No pipeline orchestration; a single route table dispatches to the library.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, ConfigCommands};
pub use presentation::{
    format_config_validation, format_plan_preview, format_run_outcome, format_status,
};
pub use route::{command_name, RunContext};
