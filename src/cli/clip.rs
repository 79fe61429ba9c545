use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use pipe_executor::generate_metadata;
use tokio::fs;

use super::context::CliContext;
use super::output::{emit, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct ClipArgs {
    /// Clip text
    pub text: Option<String>,

    /// Read the clip from a file instead
    #[arg(long, value_name = "FILE", conflicts_with = "text")]
    pub file: Option<PathBuf>,
}

pub async fn cmd_clip(args: ClipArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let text = match (args.text, args.file) {
        (Some(text), _) => text,
        (None, Some(path)) => fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        (None, None) => bail!("provide clip text or --file"),
    };

    let transform = ctx.transform();
    let metadata = generate_metadata(transform.as_ref(), &text).await;
    emit(output, &metadata, || {
        println!("Title: {}", metadata.title);
        println!("Summary: {}", metadata.summary);
        println!("Tags: {}", metadata.tags.join(", "));
    })
}
