// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-scanner")]
#[command(about = "Scan barcodes from a live camera")]
#[command(version = camera_scanner::constants::app_info::version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List {
        /// Treat these images as cameras
        #[arg(short, long)]
        image: Vec<PathBuf>,
    },

    /// Scan barcodes and print each result as a JSON line
    Scan {
        /// Camera index to use (from 'camera-scanner list')
        #[arg(short, long)]
        camera: Option<usize>,

        /// Prefer the front camera
        #[arg(short, long)]
        front: bool,

        /// Report every barcode in a frame
        #[arg(short, long)]
        multiple: bool,

        /// Exit after the first scan
        #[arg(long)]
        once: bool,

        /// Also look for inverted (light on dark) codes
        #[arg(long)]
        try_inverted: bool,

        /// Give up after this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Scan these images instead of a camera
        #[arg(short, long)]
        image: Vec<PathBuf>,

        /// Store the effective settings as defaults
        #[arg(long)]
        save_config: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_scanner=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List { image } => cli::list_cameras(image),
        Commands::Scan {
            camera,
            front,
            multiple,
            once,
            try_inverted,
            timeout,
            image,
            save_config,
        } => cli::scan(cli::ScanArgs {
            camera,
            front,
            multiple,
            once,
            try_inverted,
            timeout,
            images: image,
            save_config,
        }),
    }
}
