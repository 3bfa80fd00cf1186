//! Reel CLI - Headless media adapter toolkit
//!
//! Features:
//! - Capability queries: which backend kind resolves for a source, what a
//!   MIME type answers
//! - Simulated playback: drive the native backend on a virtual clock and
//!   dump the observed event sequence
//! - Nested session dry-runs: compute the synchronizer's seek/play
//!   decisions for a parent position and trim window

use clap::{Parser, Subcommand};

mod commands;
mod output;

/// Reel CLI - media adapter inspection toolkit
#[derive(Parser)]
#[command(name = "reel-cli")]
#[command(version)]
#[command(about = "Capability queries and simulated playback for the Reel adapter", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve which backend kind plays the given source(s)
    Resolve {
        /// Candidate source URLs, in preference order
        sources: Vec<String>,
    },

    /// Query the capability answer for a MIME type
    Canplay {
        /// MIME type, e.g. video/mp4
        mime: String,
    },

    /// Run a simulated playback and print the event sequence
    Simulate {
        /// Source URL
        source: String,

        /// Simulated media duration in seconds
        #[arg(short, long, default_value = "10")]
        duration: f64,

        /// Start playback after loading
        #[arg(short, long)]
        play: bool,

        /// Seek to this time before the clock runs
        #[arg(short, long)]
        seek: Option<f64>,

        /// Virtual milliseconds to run after loading
        #[arg(short, long, default_value = "2000")]
        run_ms: u64,
    },

    /// Dry-run a nested session's play-on-start decision
    Nested {
        /// Nested source URL
        source: String,

        /// Parent position when the window opens
        #[arg(long, default_value = "0")]
        parent_time: f64,

        /// Window open on the parent timeline
        #[arg(long, default_value = "0")]
        start: f64,

        /// Window close on the parent timeline
        #[arg(long, default_value = "10")]
        end: f64,

        /// Trim-in inside the nested medium
        #[arg(long, default_value = "0")]
        from: f64,

        /// Trim-out inside the nested medium
        #[arg(long)]
        to: Option<f64>,

        /// Simulated nested media duration
        #[arg(short, long, default_value = "10")]
        duration: f64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let format = output::Format::parse(&cli.format)?;

    match cli.command {
        Commands::Resolve { sources } => commands::resolve(&sources, format),
        Commands::Canplay { mime } => commands::canplay(&mime, format),
        Commands::Simulate {
            source,
            duration,
            play,
            seek,
            run_ms,
        } => commands::simulate(&source, duration, play, seek, run_ms, format),
        Commands::Nested {
            source,
            parent_time,
            start,
            end,
            from,
            to,
            duration,
        } => commands::nested(&source, parent_time, start, end, from, to, duration, format),
    }
}
