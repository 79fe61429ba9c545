use anyhow::Result;
use serde::Serialize;

use super::context::CliContext;
use super::output::{emit, OutputFormat};
use pipe_executor::PipeDef;

#[derive(Serialize)]
struct PipeListing<'a> {
    pipes: Vec<&'a PipeDef>,
}

pub async fn cmd_pipes(ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let catalog = ctx.catalog()?;
    let listing = PipeListing {
        pipes: catalog.iter().collect(),
    };
    emit(output, &listing, || {
        for pipe in catalog.iter() {
            let mode = if pipe.is_thinking_mode {
                "thinking"
            } else {
                "template"
            };
            println!(
                "{:<4} {:<22} {} -> {} [{}]",
                pipe.id, pipe.name, pipe.source, pipe.target, mode
            );
            if !pipe.description.is_empty() {
                println!("     {}", pipe.description);
            }
        }
    })
}
