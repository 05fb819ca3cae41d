//! patchbay - MIDI routing client
//!
//! Lists and edits the port graph of a routing authority and monitors live
//! MIDI on its ports.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use crate::cli::App;
use midi_patchbay::config::AppConfig;
use midi_patchbay::graph::PortRef;

/// MIDI patchbay - route and monitor the MIDI ports of a remote host
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "patchbay.yaml")]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Routing authority base URL, overrides the config file
    #[arg(short, long, env = "PATCHBAY_URL")]
    url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print ports and connections once
    Status {
        /// Print JSON instead of the table
        #[arg(long)]
        json: bool,
    },
    /// Keep printing the graph as it changes
    Watch,
    /// Route an output port to an input port (DEVICE:PORT)
    Connect { from: PortRef, to: PortRef },
    /// Remove a route
    Disconnect { from: PortRef, to: PortRef },
    /// Ask the authority to rebuild its state
    Reset,
    /// Show live MIDI on a port (DEVICE:PORT)
    Monitor {
        port: PortRef,
        /// One JSON object per event
        #[arg(long)]
        json: bool,
    },
    /// Interactive prompt (default)
    Repl,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    let mut config = AppConfig::load_or_default(&args.config).await?;
    if let Some(url) = args.url {
        config.authority.url = url;
    }
    config.validate().context("Invalid configuration")?;
    info!("Configuration: {}", args.config.display());

    let app = App::new(config)?;

    match args.command.unwrap_or(Command::Repl) {
        Command::Status { json } => cli::status(&app, json).await,
        Command::Watch => cli::watch(&app).await,
        Command::Connect { from, to } => cli::connect(&app, from, to).await,
        Command::Disconnect { from, to } => cli::disconnect(&app, from, to).await,
        Command::Reset => cli::reset(&app).await,
        Command::Monitor { port, json } => {
            // Best effort, only used for the display name in the header
            if !json {
                cli::refresh_best_effort(&app).await;
            }
            cli::monitor(&app, port, json).await
        }
        Command::Repl => cli::run_repl(&app).await,
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // Logs go to stderr so that --json output stays clean
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}
