//! Service configuration
//!
//! Defaults, optionally overlaid by a TOML file, then by `TXENRICH_*`
//! environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const ENV_DB: &str = "TXENRICH_DB";
pub const ENV_MODEL: &str = "TXENRICH_MODEL";
pub const ENV_HISTORY_DAYS: &str = "TXENRICH_HISTORY_DAYS";
pub const ENV_LOOKUP_TIMEOUT_MS: &str = "TXENRICH_LOOKUP_TIMEOUT_MS";
pub const ENV_MAX_BATCH: &str = "TXENRICH_MAX_BATCH";
pub const ENV_NAME_CACHE_TTL: &str = "TXENRICH_NAME_CACHE_TTL";
pub const ENV_SERVICE_NAME: &str = "TXENRICH_SERVICE_NAME";

/// Default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("txenrich").join("config.toml"))
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("txenrich")
        .join("txenrich.db")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    pub database_path: PathBuf,
    /// Classifier model artifact; rules only when absent
    pub classifier_model: Option<PathBuf>,
    pub history_retention_days: u32,
    /// Pool checkout budget for request-path lookups
    pub lookup_timeout_ms: u64,
    pub max_batch_size: usize,
    pub fuzzy_threshold: f64,
    /// TTL for the fuzzy-match name list and subscription listings
    pub name_cache_ttl_secs: u64,
    pub service_name: String,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            classifier_model: None,
            history_retention_days: 90,
            lookup_timeout_ms: 25,
            max_batch_size: 500,
            fuzzy_threshold: 0.75,
            name_cache_ttl_secs: 300,
            service_name: "txenrich".to_string(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} has an invalid value: {}", name, value)))
}

impl EnrichConfig {
    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// File (if it exists) plus environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from `lookup`, normally the process environment
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup(ENV_DB) {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_MODEL) {
            self.classifier_model = (!v.trim().is_empty()).then(|| PathBuf::from(v));
        }
        if let Some(v) = lookup(ENV_HISTORY_DAYS) {
            self.history_retention_days = parse_env(ENV_HISTORY_DAYS, &v)?;
        }
        if let Some(v) = lookup(ENV_LOOKUP_TIMEOUT_MS) {
            self.lookup_timeout_ms = parse_env(ENV_LOOKUP_TIMEOUT_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_MAX_BATCH) {
            self.max_batch_size = parse_env(ENV_MAX_BATCH, &v)?;
        }
        if let Some(v) = lookup(ENV_NAME_CACHE_TTL) {
            self.name_cache_ttl_secs = parse_env(ENV_NAME_CACHE_TTL, &v)?;
        }
        if let Some(v) = lookup(ENV_SERVICE_NAME) {
            self.service_name = v;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_retention_days == 0 {
            return Err(Error::Config("history_retention_days must be positive".into()));
        }
        if self.max_batch_size == 0 {
            return Err(Error::Config("max_batch_size must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
            return Err(Error::Config("fuzzy_threshold must be within [0, 1]".into()));
        }
        Ok(())
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.name_cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let c = EnrichConfig::default();
        assert_eq!(c.history_retention_days, 90);
        assert_eq!(c.lookup_timeout(), Duration::from_millis(25));
        assert_eq!(c.fuzzy_threshold, 0.75);
        assert!(c.database_path.ends_with("txenrich/txenrich.db"));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let c = EnrichConfig::from_toml("max_batch_size = 50\nservice_name = \"enrich-eu\"").unwrap();
        assert_eq!(c.max_batch_size, 50);
        assert_eq!(c.service_name, "enrich-eu");
        assert_eq!(c.history_retention_days, 90);
    }

    #[test]
    fn test_invalid_toml_rejected() {
        assert!(matches!(EnrichConfig::from_toml("fuzzy_threshold = 2.0"), Err(Error::Config(_))));
        assert!(matches!(EnrichConfig::from_toml("max_batch_size = \"lots\""), Err(Error::Toml(_))));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_DB, "/var/lib/txenrich.db"),
            (ENV_MODEL, "/models/linear.json"),
            (ENV_HISTORY_DAYS, "30"),
            (ENV_MAX_BATCH, "10"),
        ]
        .into_iter()
        .collect();

        let mut c = EnrichConfig::default();
        c.apply_overrides(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(c.database_path, PathBuf::from("/var/lib/txenrich.db"));
        assert_eq!(c.classifier_model, Some(PathBuf::from("/models/linear.json")));
        assert_eq!(c.history_retention_days, 30);
        assert_eq!(c.max_batch_size, 10);
    }

    #[test]
    fn test_bad_override_value() {
        let mut c = EnrichConfig::default();
        let err = c
            .apply_overrides(|k| (k == ENV_LOOKUP_TIMEOUT_MS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_LOOKUP_TIMEOUT_MS));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = EnrichConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(c.max_batch_size, EnrichConfig::default().max_batch_size);
    }
}
