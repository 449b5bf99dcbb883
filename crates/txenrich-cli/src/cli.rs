//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// txenrich - Transaction enrichment service
#[derive(Parser)]
#[command(name = "txenrich")]
#[command(about = "Clean, match, categorize and detect recurring charges in bank transactions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path (overrides the config file and TXENRICH_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set TXENRICH_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the enrichment API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Load merchants into the index
    Seed {
        /// JSON array of merchants (built-in set if omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Enrich a CSV of raw transactions and print JSON
    Enrich {
        /// CSV file with date, description, amount columns
        #[arg(short, long)]
        file: PathBuf,

        /// Account for rows without an account column
        #[arg(short, long)]
        account: Option<String>,

        /// Detect recurring patterns across the file's own transactions
        #[arg(long)]
        detect_patterns: bool,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List or cancel tracked subscriptions for an account
    Subscriptions {
        /// Account identifier
        #[arg(short, long)]
        account: String,

        #[command(subcommand)]
        action: Option<SubscriptionsAction>,
    },

    /// Show index and history counts
    Status,

    /// Drop history older than the retention window
    Prune,
}

#[derive(Subcommand)]
pub enum SubscriptionsAction {
    /// Stop tracking a pattern
    Cancel {
        /// Pattern identifier (RP-...)
        id: String,
    },
}
