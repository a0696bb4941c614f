//! Bounce CLI - bounce command

use anyhow::Result;
use bounce_cli::Overrides;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

/// Bounce - collapse bursts of events into single notifications
#[derive(Parser)]
#[command(name = "bounce")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (default: <config dir>/bounce/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Timing overrides shared by commands
#[derive(Args, Clone, Default)]
struct TimingArgs {
    /// Quiet window in milliseconds
    #[arg(long)]
    throttle_ms: Option<u64>,
    /// Absolute per-chain deadline in milliseconds
    #[arg(long)]
    max_delay_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a timeline script on a simulated clock
    Replay {
        /// Timeline script
        timeline: PathBuf,
        #[command(flatten)]
        timing: TimingArgs,
        /// Split the chain when an event's first word equals this
        #[arg(long)]
        split_on: Option<String>,
        /// Keep the splitting event in the committed chain
        #[arg(long)]
        split_include: bool,
        /// Print JSON lines instead of text
        #[arg(long)]
        json: bool,
    },
    /// Coalesce stdin lines live, one event per line
    Pipe {
        #[command(flatten)]
        timing: TimingArgs,
        /// Print JSON lines instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show the effective settings
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries bounces
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Replay { timeline, timing, split_on, split_include, json } => {
            let overrides = Overrides {
                throttle_ms: timing.throttle_ms,
                max_delay_ms: timing.max_delay_ms,
                split_on,
                split_include,
            };
            cmd::replay::run(config, &overrides, &timeline, json)
        }
        Commands::Pipe { timing, json } => {
            let overrides = Overrides {
                throttle_ms: timing.throttle_ms,
                max_delay_ms: timing.max_delay_ms,
                ..Overrides::default()
            };
            cmd::pipe::run(config, &overrides, json).await
        }
        Commands::Config => cmd::config::run(config),
    }
}
