//! Test utilities for txenrich-core
//!
//! Fixture builders for transactions, merchants and history, plus a
//! database preloaded with the built-in merchant set.

use chrono::NaiveDate;

use crate::db::Database;
use crate::models::{HistoryEntry, Merchant, MerchantLocation, RawTransaction, TransactedAt};
use crate::seed::builtin_merchants;

pub const TEST_ACCOUNT: &str = "ACT-1";

/// Fixed date so weekday-dependent behavior is stable (a Monday)
pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
}

/// Minimal raw transaction for [`TEST_ACCOUNT`] dated [`test_date`]
pub fn raw_tx(guid: &str, description: &str, amount: i64) -> RawTransaction {
    RawTransaction {
        guid: guid.to_string(),
        account_guid: TEST_ACCOUNT.to_string(),
        amount,
        description: description.to_string(),
        transacted_at: TransactedAt::Date(test_date()),
        transaction_type: None,
        status: None,
        merchant_category_code: None,
        latitude: None,
        longitude: None,
    }
}

pub fn sample_merchant(guid: &str, name: &str) -> Merchant {
    Merchant {
        guid: guid.to_string(),
        name: name.to_string(),
        logo_url: None,
        website_url: None,
        category_codes: Vec::new(),
        patterns: Vec::new(),
        locations: Vec::new(),
    }
}

pub fn sample_location(guid: &str, merchant_guid: &str, latitude: f64, longitude: f64) -> MerchantLocation {
    MerchantLocation {
        guid: guid.to_string(),
        merchant_guid: merchant_guid.to_string(),
        address: None,
        city: None,
        state: None,
        postal_code: None,
        country: None,
        latitude: Some(latitude),
        longitude: Some(longitude),
        phone: None,
    }
}

pub fn history_entry(
    guid: &str,
    merchant_guid: Option<&str>,
    amount: i64,
    date: NaiveDate,
) -> HistoryEntry {
    HistoryEntry {
        guid: guid.to_string(),
        account_guid: TEST_ACCOUNT.to_string(),
        merchant_guid: merchant_guid.map(String::from),
        amount,
        date,
        description: merchant_guid.unwrap_or("unknown").to_string(),
    }
}

/// Entries for one merchant at the given day offsets from `start`
pub fn history_series(
    merchant_guid: &str,
    amount: i64,
    start: NaiveDate,
    offsets: &[i64],
) -> Vec<HistoryEntry> {
    offsets
        .iter()
        .enumerate()
        .map(|(i, d)| {
            history_entry(
                &format!("H-{}-{}", merchant_guid, i),
                Some(merchant_guid),
                amount,
                start + chrono::Duration::days(*d),
            )
        })
        .collect()
}

/// Fresh database seeded with the built-in merchants
pub fn seeded_db() -> Database {
    let db = Database::in_memory().unwrap();
    db.seed_merchants(&builtin_merchants()).unwrap();
    db
}
