//! Per-account transaction history

use chrono::NaiveDate;
use rusqlite::params;
use tracing::debug;

use super::Database;
use crate::error::{Error, Result};
use crate::models::HistoryEntry;

fn parse_date(s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

impl Database {
    /// Append an entry to its account's history, then drop entries older than `cutoff`
    ///
    /// Re-appending a transaction guid replaces the earlier entry.
    pub fn append_history(&self, entry: &HistoryEntry, cutoff: NaiveDate) -> Result<()> {
        if entry.account_guid.is_empty() {
            return Err(Error::InvalidInput(
                "history entry requires an account".to_string(),
            ));
        }

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO transaction_history
                (guid, account_guid, merchant_guid, amount, date, description)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                entry.guid,
                entry.account_guid,
                entry.merchant_guid,
                entry.amount,
                entry.date.to_string(),
                entry.description,
            ],
        )?;

        let pruned = conn.execute(
            "DELETE FROM transaction_history WHERE account_guid = ? AND date < ?",
            params![entry.account_guid, cutoff.to_string()],
        )?;
        if pruned > 0 {
            debug!(account = %entry.account_guid, pruned, "Trimmed history window");
        }

        Ok(())
    }

    /// History for one account, oldest first
    pub fn get_history(&self, account_guid: &str) -> Result<Vec<HistoryEntry>> {
        let conn = self.lookup_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT guid, account_guid, merchant_guid, amount, date, description
            FROM transaction_history
            WHERE account_guid = ?
            ORDER BY date, id
            "#,
        )?;

        let entries = stmt
            .query_map(params![account_guid], |row| {
                Ok(HistoryEntry {
                    guid: row.get(0)?,
                    account_guid: row.get(1)?,
                    merchant_guid: row.get(2)?,
                    amount: row.get(3)?,
                    date: parse_date(&row.get::<_, String>(4)?)?,
                    description: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    /// Drop every account's entries older than `cutoff`
    pub fn prune_history(&self, cutoff: NaiveDate) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM transaction_history WHERE date < ?",
            params![cutoff.to_string()],
        )?;
        Ok(deleted)
    }

    pub fn count_history_accounts(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(DISTINCT account_guid) FROM transaction_history",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_history_entries(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM transaction_history", [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }
}
