use super::clip::cmd_clip;
use super::config::cmd_config;
use super::env::CliArgs;
use super::inject::cmd_inject;
use super::pipes::cmd_pipes;
use super::run::cmd_run;
use super::status::cmd_status;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    let output = cli.output;
    match cli.command.clone() {
        Commands::Pipes => cmd_pipes(ctx, output).await,
        Commands::Run(args) => cmd_run(args, ctx, output).await,
        Commands::Inject(args) => cmd_inject(args, ctx, output).await,
        Commands::Status(args) => cmd_status(args, ctx, output).await,
        Commands::Clip(args) => cmd_clip(args, ctx, output).await,
        Commands::Config(args) => cmd_config(args, ctx).await,
    }
}
