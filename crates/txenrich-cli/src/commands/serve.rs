//! Server command implementation

use anyhow::{Context, Result};
use txenrich_core::EnrichConfig;
use txenrich_server::ServerConfig;

use super::open_enricher;

pub async fn cmd_serve(config: EnrichConfig, host: &str, port: u16, no_encrypt: bool) -> Result<()> {
    println!("🚀 Starting txenrich server...");
    println!("   Database: {}", config.database_path.display());
    println!("   Listening: http://{}:{}", host, port);

    let server_config = ServerConfig::from_env();
    if server_config.require_auth() {
        println!("   🔒 Authentication: API key ({} configured)", server_config.api_keys.len());
    } else {
        println!();
        println!("   ⚠️  Authentication DISABLED - set TXENRICH_API_KEYS before exposing to a network");
    }

    let enricher = open_enricher(config, no_encrypt)?;
    let status = enricher.status().context("Failed to read database")?;
    println!("   Merchants: {}", status.merchants);
    println!("   Classifier: {}", status.classifier);
    if status.merchants == 0 {
        println!("   💡 Tip: Run 'txenrich seed' to load the built-in merchant set");
    }
    println!();

    txenrich_server::serve(enricher, host, port, server_config).await
}
