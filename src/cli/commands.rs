use clap::Subcommand;

use super::clip::ClipArgs;
use super::config::ConfigArgs;
use super::inject::InjectArgs;
use super::run::RunArgs;
use super::status::StatusArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// List the configured pipes
    Pipes,

    /// Run a pipe against the mock browser and stream its console
    Run(RunArgs),

    /// Inject text into the input box of a page
    Inject(InjectArgs),

    /// Show selector engine status for a URL
    Status(StatusArgs),

    /// Generate title, summary and tags for a text clip
    Clip(ClipArgs),

    /// Inspect or validate configuration
    Config(ConfigArgs),
}
