//! Stepwright - natural-language browser automation
//!
//! CLI entry point.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod server;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stepwright=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    if cli.command.is_some() {
        info!("Starting Stepwright v{}", env!("CARGO_PKG_VERSION"));
    }

    cli::run(cli).await
}
