//! api-history: API change history builder
//!
//! Command-line entrypoint that merges a build archive into a history file.
//!
//! Author: Moroya Sakamoto

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use api_history::merge::{self, MergeConfig};

/// Builds and maintains the change history of a versioned API surface
#[derive(Parser)]
#[command(name = "api-history")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge every build of an archive into the history file
    Merge {
        /// Archive directory (holds groups.json)
        #[arg(short, long, env = "API_HISTORY_ARCHIVE")]
        archive: PathBuf,

        /// History file to read and update
        #[arg(long, env = "API_HISTORY_FILE")]
        history: PathBuf,

        /// Write the merged history here instead of over the history file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Ignore the stored history and rebuild from the archive
        #[arg(long)]
        no_cache: bool,

        /// Keep tags as the builds spelled them
        #[arg(long)]
        no_normalize_tags: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Merge {
            archive,
            history,
            output,
            no_cache,
            no_normalize_tags,
        } => {
            let mut config = MergeConfig::new(archive, history)
                .with_no_cache(no_cache)
                .with_normalize_tags(!no_normalize_tags);
            if let Some(output) = output {
                config = config.with_output(output);
            }
            let report = merge::run(&config)
                .with_context(|| format!("merge {}", config.archive.display()))?;
            info!(
                fetched = report.fetched,
                replayed = report.replayed,
                skipped = report.skipped.len(),
                dropped = report.dropped.len(),
                actions = report.actions,
                "done"
            );
        }
    }

    Ok(())
}
