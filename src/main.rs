use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    synapse_cli::cli::app::run().await
}
