//! Command-line interface for drainpool
//!
//! Parses arguments with clap, loads the layered configuration and dispatches
//! to the command implementations.

use crate::config::DrainpoolConfig;
use crate::pool::ProgressMode;
use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub mod commands;
mod output;

pub use output::Output;

/// drainpool - drain a work queue with a bounded pool of workers
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path (TOML, JSON or YAML)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable quiet output (minimal)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Feed a batch of items through the worker pool
    Run(RunArgs),
    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Show version information
    Version,
}

/// Flags of `drainpool run`; each one overrides the matching config key
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Number of items to produce
    #[arg(short = 'n', long)]
    pub items: Option<usize>,

    /// Number of concurrent workers (0 = derive from CPU cores)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Simulated work per item in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Progress reporting mode
    #[arg(short, long, value_enum)]
    pub progress: Option<ProgressMode>,

    /// Log a progress line every N items (log mode)
    #[arg(long)]
    pub log_every: Option<usize>,

    /// Input queue capacity (negative = unbounded, 0 = rendezvous)
    #[arg(long, allow_hyphen_values = true)]
    pub queue_capacity: Option<i64>,

    /// Make every Nth item fail (0 = never)
    #[arg(long)]
    pub fail_every: Option<usize>,
}

impl RunArgs {
    /// Apply the flags given on the command line on top of `config`
    pub fn apply(&self, mut config: DrainpoolConfig) -> DrainpoolConfig {
        if let Some(items) = self.items {
            config.demo.items = items;
        }
        if let Some(workers) = self.workers {
            config.pool.workers = workers;
        }
        if let Some(delay_ms) = self.delay_ms {
            config.demo.delay_ms = delay_ms;
        }
        if let Some(mode) = self.progress {
            config.progress.mode = mode;
        }
        if let Some(log_every) = self.log_every {
            config.progress.log_every = log_every;
        }
        if let Some(capacity) = self.queue_capacity {
            config.pool.queue_capacity = capacity;
        }
        if let Some(fail_every) = self.fail_every {
            config.demo.fail_every = fail_every;
        }
        config
    }
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate configuration
    Validate,
    /// Show the merged configuration
    Show,
}

impl Cli {
    /// Install the tracing subscriber; `RUST_LOG` takes precedence over the flags
    pub fn init_tracing(&self) {
        let default_directive = if self.verbose {
            "drainpool=debug"
        } else if self.quiet {
            "warn"
        } else {
            "drainpool=info"
        };

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

        // Logs go to stderr so they never mix with reports on stdout
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init();
    }

    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        let output = Output::new(self.verbose, self.quiet);

        match self.command {
            Some(Commands::Run(args)) => {
                let config = DrainpoolConfig::load_with_custom_config(self.config.as_deref())?;
                commands::run::execute(args, config, self.format, &output).await
            }
            Some(Commands::Config(cmd)) => {
                commands::config::execute(cmd, self.config.as_deref(), self.format, &output).await
            }
            Some(Commands::Version) => commands::version::execute(&output).await,
            None => {
                // Show help when no command is provided
                let mut cmd = Cli::command();
                cmd.print_help()?;
                Ok(())
            }
        }
    }
}
