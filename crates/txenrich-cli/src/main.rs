//! txenrich CLI - Transaction enrichment service
//!
//! Usage:
//!   txenrich seed                       Load the built-in merchant set
//!   txenrich enrich --file tx.csv       Enrich a CSV and print JSON
//!   txenrich serve --port 8080          Start the API server
//!   txenrich subscriptions --account A  List tracked subscriptions

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    let config = commands::load_config(cli.config.as_deref(), cli.db.as_deref())?;

    match cli.command {
        Commands::Serve { port, host } => {
            commands::cmd_serve(config, &host, port, cli.no_encrypt).await
        }
        Commands::Seed { file } => commands::cmd_seed(&config, file.as_deref(), cli.no_encrypt),
        Commands::Enrich {
            file,
            account,
            detect_patterns,
            output,
        } => {
            commands::cmd_enrich(
                config,
                &file,
                account.as_deref(),
                detect_patterns,
                output.as_deref(),
                cli.no_encrypt,
            )
            .await
        }
        Commands::Subscriptions { account, action } => {
            let enricher = commands::open_enricher(config, cli.no_encrypt)?;
            match action {
                Some(SubscriptionsAction::Cancel { id }) => {
                    commands::cmd_subscriptions_cancel(&enricher, &account, &id)
                }
                None => commands::cmd_subscriptions_list(&enricher, &account),
            }
        }
        Commands::Status => {
            let enricher = commands::open_enricher(config, cli.no_encrypt)?;
            commands::cmd_status(&enricher)
        }
        Commands::Prune => {
            let enricher = commands::open_enricher(config, cli.no_encrypt)?;
            commands::cmd_prune(&enricher)
        }
    }
}
