// SPDX-License-Identifier: GPL-3.0-only

use camscan::i18n;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camscan")]
#[command(about = "Scan QR codes from image-backed cameras")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Scanner configuration file (default: ~/.config/camscan/scanner.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the cameras built from the given images
    Devices {
        /// Rear camera frames
        #[arg(short, long)]
        rear: Vec<PathBuf>,

        /// Front camera frames
        #[arg(short, long)]
        front: Vec<PathBuf>,
    },

    /// Scan the given images until a code is decoded
    Scan {
        /// Rear camera frames
        #[arg(short, long)]
        rear: Vec<PathBuf>,

        /// Front camera frames
        #[arg(short, long)]
        front: Vec<PathBuf>,

        /// Give up after this many seconds
        #[arg(short, long, default_value = "10")]
        timeout: u64,

        /// Acquire the camera through the shared stream manager
        #[arg(short, long)]
        shared: bool,

        /// Keep printing codes instead of stopping at the first one
        #[arg(short = 'k', long)]
        keep_going: bool,
    },

    /// Print the effective scanner configuration
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camscan=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    // Get the system's preferred languages.
    let requested_languages = i18n_embed::DesktopLanguageRequester::requested_languages();
    i18n::init(&requested_languages);

    let cli = Cli::parse();
    let config = camscan::ScannerConfig::load_or_default(cli.config.as_deref());

    match cli.command {
        Commands::Devices { rear, front } => cli::list_devices(&rear, &front),
        Commands::Scan {
            rear,
            front,
            timeout,
            shared,
            keep_going,
        } => cli::scan(config, &rear, &front, timeout, shared, keep_going),
        Commands::Config => cli::print_config(&config),
    }
}
