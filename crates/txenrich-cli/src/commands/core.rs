//! Shared command utilities
//!
//! - `load_config` - Config file, environment, then `--db`
//! - `open_db` - Open the database, encrypted unless `--no-encrypt`
//! - `open_enricher` - Database plus configured classifier

use std::path::Path;

use anyhow::{bail, Context, Result};
use txenrich_core::config::default_config_path;
use txenrich_core::{Database, EnrichConfig, Enricher};

/// Resolve configuration; an explicitly named config file must exist
pub fn load_config(config_path: Option<&Path>, db_override: Option<&Path>) -> Result<EnrichConfig> {
    let mut config = match config_path {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            EnrichConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => match default_config_path() {
            Some(path) => EnrichConfig::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => EnrichConfig::from_env().context("Invalid environment configuration")?,
        },
    };

    if let Some(db) = db_override {
        config.database_path = db.to_path_buf();
    }
    Ok(config)
}

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

pub fn open_enricher(config: EnrichConfig, no_encrypt: bool) -> Result<Enricher> {
    let db = open_db(&config.database_path, no_encrypt)?;
    Ok(Enricher::from_config(db, config))
}
