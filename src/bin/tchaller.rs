//! tchaller binary entry point

use clap::Parser;
use tchaller::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    Cli::parse().run().await
}
