//! CDK demo connectors
//!
//! Runs either a sink that prints what it receives or a source that emits
//! heartbeat events, both on top of the `cdk-core` runtime.

mod display;
mod heartbeat;

use cdk_core::config::resolver::{ENV_CONFIG_PATH, ENV_SECRET_PATH};
use cdk_core::{ConfigPaths, ConfigResolver};
use clap::{Parser, Subcommand};
use display::DisplaySink;
use heartbeat::HeartbeatSource;
use std::path::PathBuf;

/// CDK demo - example source and sink connectors
#[derive(Parser, Debug)]
#[command(name = "cdk-demo")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the JSON config file
    #[arg(short, long, env = ENV_CONFIG_PATH)]
    config: Option<PathBuf>,

    /// Path to the JSON secret file
    #[arg(short, long, env = ENV_SECRET_PATH)]
    secret: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Receive events and print them
    Sink,
    /// Emit a heartbeat event at a fixed interval
    Source,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cdk_core::init_tracing();

    let args = Args::parse();
    tracing::info!("Starting cdk-demo v{}", env!("CARGO_PKG_VERSION"));

    let mut paths = ConfigPaths::default();
    if let Some(config) = args.config {
        paths = paths.with_config(config);
    }
    if let Some(secret) = args.secret {
        paths = paths.with_secret(secret);
    }
    let settings = ConfigResolver::load(&paths);

    match args.command {
        Command::Sink => cdk_core::run_sink(settings, DisplaySink::default()).await?,
        Command::Source => cdk_core::run_source(settings, HeartbeatSource::default()).await?,
    }

    tracing::info!("cdk-demo exited");
    Ok(())
}
