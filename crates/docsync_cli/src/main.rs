//! DocSync CLI
//!
//! Command-line tools for staging documents and working with memory backend
//! snapshots.
//!
//! # Commands
//!
//! - `load` - Insert JSON documents into the backend the options describe
//! - `inspect` - Display snapshot contents
//! - `apply-diff` - Apply diff files to a snapshot in place
//! - `trim` - Run the default post-processing chain over a snapshot

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// DocSync command-line tools.
#[derive(Parser)]
#[command(name = "docsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert documents into a backend and finalize it
    Load {
        /// Backend options file (JSON)
        #[arg(short, long)]
        options: PathBuf,

        /// Documents to load (JSON array or one object per line)
        #[arg(short, long)]
        input: PathBuf,

        /// Directory the snapshot is written to
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Display snapshot contents
    Inspect {
        /// Snapshot file
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Show a single document
        #[arg(long)]
        id: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Apply diffs to a snapshot in place
    ApplyDiff {
        /// Snapshot file
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Diff file (one diff object or an array of them)
        #[arg(short, long)]
        diff: PathBuf,
    },

    /// Prune foreign species from every document in a snapshot
    Trim {
        /// Snapshot file
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Report what would change without rewriting the snapshot
        #[arg(long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Load {
            options,
            input,
            out_dir,
            format,
        } => {
            commands::load::run(&options, &input, &out_dir, &format)?;
        }
        Commands::Inspect {
            snapshot,
            id,
            format,
        } => {
            commands::inspect::run(&snapshot, id.as_deref(), &format)?;
        }
        Commands::ApplyDiff { snapshot, diff } => {
            commands::apply_diff::run(&snapshot, &diff)?;
        }
        Commands::Trim { snapshot, dry_run } => {
            commands::trim::run(&snapshot, dry_run)?;
        }
        Commands::Version => {
            println!("DocSync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("DocSync Core v{}", docsync_core::VERSION);
        }
    }

    Ok(())
}
