//! Offline CSV enrichment command

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use txenrich_core::import::read_transactions_csv;
use txenrich_core::models::{EnrichedTransaction, HistoryEntry, RawTransaction};
use txenrich_core::{EnrichConfig, Enricher};

use super::open_enricher;

pub async fn cmd_enrich(
    config: EnrichConfig,
    file: &Path,
    account: Option<&str>,
    detect_patterns: bool,
    output: Option<&Path>,
    no_encrypt: bool,
) -> Result<()> {
    let enricher = Arc::new(open_enricher(config, no_encrypt)?);
    let results = enrich_file(&enricher, file, account, detect_patterns).await?;

    match output {
        Some(path) => {
            let mut out = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            serde_json::to_writer_pretty(&mut out, &results)?;
            writeln!(out)?;
            eprintln!("✅ Enriched {} transactions → {}", results.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            serde_json::to_writer_pretty(&mut lock, &results)?;
            writeln!(lock)?;
        }
    }

    print_summary(&results);
    Ok(())
}

/// Read `file` and run it through the batch pipeline
///
/// With `detect_patterns`, a first pass produces cleaned descriptions and
/// merchants that become the history for a second pass.
pub async fn enrich_file(
    enricher: &Arc<Enricher>,
    file: &Path,
    account: Option<&str>,
    detect_patterns: bool,
) -> Result<Vec<EnrichedTransaction>> {
    let reader = File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let transactions = read_transactions_csv(BufReader::new(reader), account)
        .with_context(|| format!("Failed to parse {}", file.display()))?;
    tracing::info!(count = transactions.len(), file = %file.display(), "Loaded transactions");

    let first = enrich_chunked(enricher, transactions.clone(), Vec::new()).await?;
    if !detect_patterns {
        return Ok(first);
    }

    let history: Vec<HistoryEntry> = first
        .iter()
        .map(|e| e.history_entry(&e.transaction.account_guid))
        .collect();
    enrich_chunked(enricher, transactions, history).await
}

/// Split into batches the enricher accepts, keeping input order
async fn enrich_chunked(
    enricher: &Arc<Enricher>,
    transactions: Vec<RawTransaction>,
    history: Vec<HistoryEntry>,
) -> Result<Vec<EnrichedTransaction>> {
    let chunk_size = enricher.config().max_batch_size.max(1);
    let mut results = Vec::with_capacity(transactions.len());

    for chunk in transactions.chunks(chunk_size) {
        let enriched = enricher
            .enrich_batch(chunk.to_vec(), None, history.clone())
            .await
            .context("Enrichment failed")?;
        results.extend(enriched);
    }
    Ok(results)
}

fn print_summary(results: &[EnrichedTransaction]) {
    let matched = results.iter().filter(|r| r.merchant_guid.is_some()).count();
    let subscriptions = results.iter().filter(|r| r.is_subscription).count();
    let recurring = results.iter().filter(|r| r.recurring_pattern.is_some()).count();

    eprintln!();
    eprintln!("📊 Enrichment Summary");
    eprintln!("   Transactions:  {}", results.len());
    eprintln!("   Merchants:     {} matched", matched);
    eprintln!("   Recurring:     {}", recurring);
    eprintln!("   Subscriptions: {}", subscriptions);
}
