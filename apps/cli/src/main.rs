//! Tidewatch CLI: polls social-media search for coastal hazard mentions.
//!
//! Each new matching post is stored once as an unprocessed mention for
//! downstream review.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
