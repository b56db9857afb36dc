// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! fdleak CLI
//!
//! Invokes configured handlers in-process and prints the descriptor and
//! socket report each invocation produces.

use clap::{Parser, Subcommand};

mod commands;
mod metrics;

/// fdleak - Per-invocation descriptor and socket accounting
#[derive(Parser)]
#[command(name = "fdleak")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "fdleak.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Invoke a function repeatedly on this process
    Invoke {
        /// Function ID from the configuration
        function: String,

        /// Number of invocations (0 = until one fails)
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u64,

        /// Pause between invocations in milliseconds
        #[arg(short, long, default_value_t = 0)]
        interval_ms: u64,

        /// Print Prometheus metrics after the last invocation
        #[arg(short, long)]
        metrics: bool,
    },

    /// Print a resource report for this process
    Snapshot {
        /// Emit JSON instead of the text report
        #[arg(long)]
        json: bool,
    },

    /// List configured functions
    List,

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    // Dispatch to command handlers
    match cli.command {
        Commands::Invoke {
            function,
            count,
            interval_ms,
            metrics,
        } => commands::invoke::execute(&cli.config, &function, count, interval_ms, metrics).await,
        Commands::Snapshot { json } => commands::snapshot::execute(json).await,
        Commands::List => commands::list::execute(&cli.config).await,
        Commands::Validate { file } => commands::validate::execute(&file).await,
    }
}
