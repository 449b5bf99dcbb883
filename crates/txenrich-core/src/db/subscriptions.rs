//! Tracked subscription operations

use std::collections::HashSet;

use chrono::NaiveDate;
use rusqlite::params;

use super::Database;
use crate::error::Result;
use crate::models::{Frequency, RecurringPattern};

impl Database {
    /// Upsert a tracked pattern for an account, keyed by pattern id
    pub fn track_subscription(&self, account_guid: &str, pattern: &RecurringPattern) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO tracked_subscriptions
                (account_guid, pattern_guid, merchant_guid, amount, frequency, predicted_next_date,
                 confidence, occurrence_count, last_occurrence_date)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(account_guid, pattern_guid) DO UPDATE SET
                merchant_guid = excluded.merchant_guid,
                amount = excluded.amount,
                frequency = excluded.frequency,
                predicted_next_date = excluded.predicted_next_date,
                confidence = excluded.confidence,
                occurrence_count = excluded.occurrence_count,
                last_occurrence_date = excluded.last_occurrence_date,
                updated_at = CURRENT_TIMESTAMP
            "#,
            params![
                account_guid,
                pattern.guid,
                pattern.merchant_guid,
                pattern.amount,
                pattern.frequency.as_str(),
                pattern.predicted_next_date.map(|d| d.to_string()),
                pattern.confidence,
                pattern.occurrence_count,
                pattern.last_occurrence_date.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Tracked patterns for an account, most confident first
    pub fn list_tracked_subscriptions(&self, account_guid: &str) -> Result<Vec<RecurringPattern>> {
        let conn = self.lookup_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT pattern_guid, merchant_guid, amount, frequency, predicted_next_date,
                   confidence, occurrence_count, last_occurrence_date
            FROM tracked_subscriptions
            WHERE account_guid = ?
            ORDER BY confidence DESC, pattern_guid
            "#,
        )?;

        let rows = stmt
            .query_map(params![account_guid], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, f64>(5)?,
                    row.get::<_, u32>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        // Rows with an unreadable frequency or date are skipped rather than failing the listing
        let patterns = rows
            .into_iter()
            .filter_map(|(guid, merchant_guid, amount, freq, next, confidence, count, last)| {
                Some(RecurringPattern {
                    guid,
                    merchant_guid,
                    amount,
                    frequency: freq.parse::<Frequency>().ok()?,
                    predicted_next_date: next.and_then(|s| s.parse::<NaiveDate>().ok()),
                    confidence,
                    occurrence_count: count,
                    last_occurrence_date: last.parse::<NaiveDate>().ok()?,
                })
            })
            .collect();

        Ok(patterns)
    }

    /// Delete a tracked pattern; returns false when nothing matched
    pub fn cancel_tracked_subscription(&self, account_guid: &str, pattern_guid: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM tracked_subscriptions WHERE account_guid = ? AND pattern_guid = ?",
            params![account_guid, pattern_guid],
        )?;
        Ok(deleted > 0)
    }

    /// Remember that an account cancelled a pattern
    pub fn suppress_subscription(&self, account_guid: &str, pattern_guid: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO cancelled_subscriptions (account_guid, pattern_guid) VALUES (?, ?)",
            params![account_guid, pattern_guid],
        )?;
        Ok(())
    }

    /// Pattern ids an account has cancelled
    pub fn cancelled_subscription_ids(&self, account_guid: &str) -> Result<HashSet<String>> {
        let conn = self.lookup_conn()?;
        let mut stmt =
            conn.prepare("SELECT pattern_guid FROM cancelled_subscriptions WHERE account_guid = ?")?;
        let ids = stmt
            .query_map(params![account_guid], |row| row.get(0))?
            .collect::<rusqlite::Result<HashSet<String>>>()?;
        Ok(ids)
    }
}
