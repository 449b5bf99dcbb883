//! Merchant seeding command

use std::path::Path;

use anyhow::{Context, Result};
use txenrich_core::seed::{builtin_merchants, load_merchants_file};
use txenrich_core::{EnrichConfig, Enricher};

use super::open_enricher;

pub fn cmd_seed(config: &EnrichConfig, file: Option<&Path>, no_encrypt: bool) -> Result<()> {
    let enricher = open_enricher(config.clone(), no_encrypt)?;
    seed_merchants(&enricher, file)?;
    Ok(())
}

/// Seed from `file`, or the built-in set; returns the number written
pub fn seed_merchants(enricher: &Enricher, file: Option<&Path>) -> Result<usize> {
    let merchants = match file {
        Some(path) => {
            println!("🌱 Seeding merchants from {}...", path.display());
            load_merchants_file(path)
                .with_context(|| format!("Failed to read merchants from {}", path.display()))?
        }
        None => {
            println!("🌱 Seeding built-in merchants...");
            builtin_merchants()
        }
    };

    let count = enricher.seed(&merchants).context("Failed to seed merchants")?;
    let total = enricher.status()?.merchants;

    println!("✅ Seeded {} merchants ({} in index)", count, total);
    Ok(count)
}
