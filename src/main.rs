use anyhow::Result;
use agenda::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
