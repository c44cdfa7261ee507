//! Scenecast CLI — Command-line interface for frame-sequence export.
//!
//! Usage:
//!   scenecast export <MANIFEST> [--frames <PATH>]   Run an export
//!   scenecast graph <MANIFEST>                      Print the audio filter graph
//!   scenecast check                                 Check encoder availability

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "scenecast",
    about = "Offline export of rendered frame sequences and audio to video",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a manifest: raw RGBA frames in, encoded video out
    Export {
        /// Path to the export manifest (JSON)
        manifest: PathBuf,

        /// Raw frame stream to read (defaults to stdin)
        #[arg(short, long)]
        frames: Option<PathBuf>,
    },

    /// Print the audio filter graph a manifest would produce
    Graph {
        /// Path to the export manifest (JSON)
        manifest: PathBuf,
    },

    /// Check encoder availability
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging from the app config; --verbose overrides the level.
    let mut logging = scenecast_common::AppConfig::load().logging;
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    scenecast_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Export { manifest, frames } => commands::export::run(manifest, frames).await,
        Commands::Graph { manifest } => commands::graph::run(manifest),
        Commands::Check => commands::check::run(),
    }
}
