use anyhow::{Context, Result};
use clap::Args;
use selector_config::SelectorConfigStore;

use super::context::CliContext;
use super::output::{emit, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct StatusArgs {
    /// Page URL to resolve against the selector config
    pub url: String,
}

pub async fn cmd_status(args: StatusArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let source = ctx.config().selector_source();
    let store = SelectorConfigStore::load(source.clone())
        .await
        .with_context(|| format!("loading selector config from {source}"))?;
    let report = store.status_report(&args.url);

    emit(output, &report, || {
        println!("Engine: {}", report.headline());
        println!("Config version: {}", report.version);
        println!("Source: {}", source);
        println!(
            "Platform: {}",
            report.platform.as_deref().unwrap_or("(none)")
        );
        println!("Strategy: {}", report.strategy);
        println!(
            "Killswitch: {}",
            if report.killswitch { "on" } else { "off" }
        );
        println!("Input selectors:");
        for selector in &report.input_selectors {
            println!("  - {selector}");
        }
    })
}
