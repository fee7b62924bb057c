//! Clipdeck CLI
//!
//! Command-line tools for inspecting a Clipdeck client's local state.
//!
//! # Commands
//!
//! - `inspect` - List stored keys and their sizes
//! - `offline` - List mutations waiting in offline queues
//! - `verify` - Check that drafts and offline queues decode and validate

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Clipdeck local state tools.
#[derive(Parser)]
#[command(name = "clipdeck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the state directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored keys and their sizes
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List mutations waiting in offline queues
    Offline {
        /// Maximum number of entries per queue
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check drafts and offline queues
    Verify,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("State path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Offline { limit, format } => {
            let path = cli.path.ok_or("State path required for offline")?;
            commands::offline::run(&path, limit, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("State path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Version => {
            println!("Clipdeck CLI v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Offline log format v{}",
                clipdeck_protocol::OFFLINE_LOG_VERSION
            );
        }
    }

    Ok(())
}
