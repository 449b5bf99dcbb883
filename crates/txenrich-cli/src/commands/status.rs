//! Status and maintenance commands

use anyhow::Result;
use txenrich_core::Enricher;

pub fn cmd_status(enricher: &Enricher) -> Result<()> {
    let config = enricher.config();
    let status = enricher.status()?;

    println!("📊 txenrich Status");
    println!("   Database:    {}", config.database_path.display());

    if status.encrypted {
        println!("   Encryption:  🔒 Enabled (SQLCipher)");
    } else {
        println!("   Encryption:  ⚠️  DISABLED");
    }

    if let Ok(metadata) = std::fs::metadata(&config.database_path) {
        let size_kb = metadata.len() as f64 / 1024.0;
        if size_kb > 1024.0 {
            println!("   Size:        {:.1} MB", size_kb / 1024.0);
        } else {
            println!("   Size:        {:.1} KB", size_kb);
        }
    }

    println!();
    println!("   Merchants:   {}", status.merchants);
    println!("   History:     {} entries across {} accounts", status.history_entries, status.history_accounts);
    println!("   Retention:   {} days", config.history_retention_days);
    println!("   Classifier:  {}", status.classifier);

    if status.merchants == 0 {
        println!();
        println!("💡 Tip: Run 'txenrich seed' to load the built-in merchant set");
    }
    Ok(())
}

pub fn cmd_prune(enricher: &Enricher) -> Result<()> {
    let removed = enricher.prune_history()?;
    println!(
        "🧹 Removed {} history entries older than {} days",
        removed,
        enricher.config().history_retention_days
    );
    Ok(())
}
