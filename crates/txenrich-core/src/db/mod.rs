//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `merchants` - Merchant index: records, name/pattern/category-code keys, locations
//! - `history` - Per-account rolling transaction history
//! - `subscriptions` - Tracked and cancelled subscription patterns per account

use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::{Error, Result};

mod history;
mod merchants;
mod subscriptions;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "TXENRICH_DB_KEY";

/// Default budget for checking out a connection on the request path
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(25);

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Changing this invalidates every existing encrypted database
    const APP_SALT: &[u8; 16] = b"txenrich-salt-v1";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    db_path: String,
    encrypted: bool,
    /// Pool checkout budget for request-path lookups
    lookup_timeout: Duration,
}

impl Database {
    /// Create a new encrypted database connection pool
    ///
    /// Requires `TXENRICH_DB_KEY` to be set. Use `new_unencrypted()` for
    /// development and tests.
    pub fn new(path: &str) -> Result<Self> {
        match std::env::var(DB_KEY_ENV).ok() {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases (not recommended for production).",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = if let Some(pass) = passphrase {
            let key = derive_key(pass)?;
            let key_pragma = format!("PRAGMA key = 'x\"{}\"';", key);

            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                Ok(())
            });

            Pool::builder().max_size(10).build(manager)?
        } else {
            Pool::builder().max_size(10).build(manager)?
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
            encrypted: passphrase.is_some(),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Set the checkout budget used by [`Database::lookup_conn`]
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` because every pooled
    /// connection would otherwise see its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "txenrich_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path.to_string_lossy())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Get a connection within the lookup budget
    ///
    /// Request-path reads use this so a saturated pool surfaces as an error
    /// quickly instead of stalling the request.
    pub fn lookup_conn(&self) -> Result<DbConn> {
        Ok(self.pool.get_timeout(self.lookup_timeout)?)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA cache_size = 2000;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Merchant index: one row per merchant, list fields as JSON arrays
            CREATE TABLE IF NOT EXISTS merchants (
                guid TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                logo_url TEXT,
                website_url TEXT,
                category_codes TEXT NOT NULL DEFAULT '[]',
                patterns TEXT NOT NULL DEFAULT '[]',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Secondary keys, each mapping to one merchant
            CREATE TABLE IF NOT EXISTS merchant_names (
                normalized_name TEXT PRIMARY KEY,
                merchant_guid TEXT NOT NULL REFERENCES merchants(guid) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS merchant_patterns (
                pattern TEXT PRIMARY KEY,
                merchant_guid TEXT NOT NULL REFERENCES merchants(guid) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS merchant_category_codes (
                code INTEGER PRIMARY KEY,
                merchant_guid TEXT NOT NULL REFERENCES merchants(guid) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_merchant_names_guid ON merchant_names(merchant_guid);
            CREATE INDEX IF NOT EXISTS idx_merchant_patterns_guid ON merchant_patterns(merchant_guid);
            CREATE INDEX IF NOT EXISTS idx_merchant_codes_guid ON merchant_category_codes(merchant_guid);

            CREATE TABLE IF NOT EXISTS merchant_locations (
                guid TEXT PRIMARY KEY,
                merchant_guid TEXT NOT NULL REFERENCES merchants(guid) ON DELETE CASCADE,
                address TEXT,
                city TEXT,
                state TEXT,
                postal_code TEXT,
                country TEXT,
                latitude REAL,
                longitude REAL,
                phone TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_merchant_locations_merchant ON merchant_locations(merchant_guid);

            -- Rolling per-account history, pruned to the retention window
            CREATE TABLE IF NOT EXISTS transaction_history (
                id INTEGER PRIMARY KEY,
                guid TEXT NOT NULL,
                account_guid TEXT NOT NULL,
                merchant_guid TEXT,
                amount INTEGER NOT NULL,
                date DATE NOT NULL,
                description TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(account_guid, guid)
            );

            CREATE INDEX IF NOT EXISTS idx_history_account_date ON transaction_history(account_guid, date);
            CREATE INDEX IF NOT EXISTS idx_history_date ON transaction_history(date);

            -- Subscriptions tracked per account, keyed by pattern id
            CREATE TABLE IF NOT EXISTS tracked_subscriptions (
                account_guid TEXT NOT NULL,
                pattern_guid TEXT NOT NULL,
                merchant_guid TEXT,
                amount INTEGER NOT NULL,
                frequency TEXT NOT NULL,
                predicted_next_date DATE,
                confidence REAL NOT NULL,
                occurrence_count INTEGER NOT NULL,
                last_occurrence_date DATE NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (account_guid, pattern_guid)
            );

            -- Patterns the account holder cancelled; hidden from listings
            CREATE TABLE IF NOT EXISTS cancelled_subscriptions (
                account_guid TEXT NOT NULL,
                pattern_guid TEXT NOT NULL,
                cancelled_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (account_guid, pattern_guid)
            );
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
