//! Raw transaction CSV reader for offline enrichment
//!
//! Columns are matched by header name (case-insensitive):
//! `date`, `description`, `amount` are required; `guid`, `account_guid`,
//! `type`, `status`, `mcc`, `latitude`, `longitude` are optional.
//! Amounts are in major units (`-15.99`) and stored as minor units.

use std::collections::HashMap;
use std::io::Read;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{RawTransaction, TransactedAt};

struct Columns(HashMap<String, usize>);

impl Columns {
    fn from_headers(headers: &StringRecord) -> Self {
        Self(
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.trim().to_lowercase(), i))
                .collect(),
        )
    }

    fn get<'r>(&self, record: &'r StringRecord, names: &[&str]) -> Option<&'r str> {
        names
            .iter()
            .find_map(|n| self.0.get(*n))
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn require<'r>(&self, record: &'r StringRecord, names: &[&str], line: u64) -> Result<&'r str> {
        self.get(record, names).ok_or_else(|| {
            Error::InvalidInput(format!("line {}: missing {}", line, names[0]))
        })
    }
}

/// Read raw transactions; rows without an account use `default_account`
pub fn read_transactions_csv<R: Read>(
    reader: R,
    default_account: Option<&str>,
) -> Result<Vec<RawTransaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let columns = Columns::from_headers(rdr.headers()?);
    let mut transactions = Vec::new();

    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let description = columns
            .require(&record, &["description", "desc", "memo"], line)?
            .to_string();
        let transacted_at = parse_transacted_at(columns.require(&record, &["date", "transacted_at"], line)?)
            .map_err(|e| Error::InvalidInput(format!("line {}: {}", line, e)))?;
        let amount = parse_amount_minor(columns.require(&record, &["amount"], line)?)
            .map_err(|e| Error::InvalidInput(format!("line {}: {}", line, e)))?;

        let account_guid = columns
            .get(&record, &["account_guid", "account"])
            .or(default_account)
            .ok_or_else(|| Error::InvalidInput(format!("line {}: no account for row", line)))?
            .to_string();

        let guid = match columns.get(&record, &["guid", "id"]) {
            Some(g) => g.to_string(),
            None => row_guid(&account_guid, &transacted_at, &description, amount, line),
        };

        let parse_opt = |names: &[&str]| -> Result<Option<f64>> {
            columns
                .get(&record, names)
                .map(|s| {
                    s.parse::<f64>().map_err(|_| {
                        Error::InvalidInput(format!("line {}: bad {} value {}", line, names[0], s))
                    })
                })
                .transpose()
        };

        transactions.push(RawTransaction {
            guid,
            account_guid,
            amount,
            description,
            transacted_at,
            transaction_type: columns
                .get(&record, &["type", "transaction_type"])
                .and_then(|s| s.parse().ok()),
            status: columns.get(&record, &["status"]).and_then(|s| s.parse().ok()),
            merchant_category_code: columns
                .get(&record, &["mcc", "merchant_category_code"])
                .and_then(|s| s.parse().ok()),
            latitude: parse_opt(&["latitude", "lat"])?,
            longitude: parse_opt(&["longitude", "lon", "lng"])?,
        });
    }

    debug!("Parsed {} raw transactions", transactions.len());
    Ok(transactions)
}

/// Deterministic id for rows that carry none
fn row_guid(account: &str, at: &TransactedAt, description: &str, amount: i64, line: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}|{}|{}|{}", account, at.date(), description, amount, line));
    format!("TRN-{}", &hex::encode(hasher.finalize())[..16])
}

fn parse_transacted_at(s: &str) -> std::result::Result<TransactedAt, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(TransactedAt::DateTime(dt));
    }
    if let Some(dt) = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Ok(TransactedAt::Local(dt));
    }

    let formats = ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%m-%d-%Y"];
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(TransactedAt::Date)
        .ok_or_else(|| format!("unable to parse date: {}", s))
}

/// `"$1,234.56"` / `"(12.00)"` / `"-15.99"` to minor units
fn parse_amount_minor(s: &str) -> std::result::Result<i64, String> {
    let cleaned: String = s
        .trim()
        .replace(['$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| (v * 100.0).round() as i64)
        .ok_or_else(|| format!("unable to parse amount: {}", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionType;

    #[test]
    fn test_parse_amount_minor() {
        assert_eq!(parse_amount_minor("$1,234.56"), Ok(123456));
        assert_eq!(parse_amount_minor("-15.99"), Ok(-1599));
        assert_eq!(parse_amount_minor("(12.00)"), Ok(-1200));
        assert!(parse_amount_minor("abc").is_err());
    }

    #[test]
    fn test_parse_transacted_at() {
        assert_eq!(
            parse_transacted_at("01/15/2024").unwrap().date(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert_eq!(
            parse_transacted_at("2024-01-15T08:30:00Z").unwrap().hour(),
            Some(8)
        );
        assert_eq!(
            parse_transacted_at("2024-01-15 21:10:00").unwrap().hour(),
            Some(21)
        );
        assert!(parse_transacted_at("yesterday").is_err());
    }

    #[test]
    fn test_read_with_default_account() {
        let csv = "date,description,amount,mcc,type\n\
                   2024-01-15,NETFLIX.COM,-15.99,4899,debit\n\
                   2024-01-16,STARBUCKS #123,-5.50,,\n";
        let txs = read_transactions_csv(csv.as_bytes(), Some("ACT-1")).unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].account_guid, "ACT-1");
        assert_eq!(txs[0].amount, -1599);
        assert_eq!(txs[0].merchant_category_code, Some(4899));
        assert_eq!(txs[0].transaction_type, Some(TransactionType::Debit));
        assert!(txs[1].merchant_category_code.is_none());
        assert!(txs[0].guid.starts_with("TRN-"));
        assert_ne!(txs[0].guid, txs[1].guid);
    }

    #[test]
    fn test_missing_account_rejected() {
        let csv = "date,description,amount\n2024-01-15,NETFLIX.COM,-15.99\n";
        assert!(read_transactions_csv(csv.as_bytes(), None).is_err());
    }

    #[test]
    fn test_row_account_and_guid_win() {
        let csv = "guid,account_guid,date,description,amount,latitude,longitude\n\
                   TRN-9,ACT-7,2024-01-15,SHELL OIL,-40.00,37.77,-122.41\n";
        let txs = read_transactions_csv(csv.as_bytes(), Some("ACT-1")).unwrap();
        assert_eq!(txs[0].guid, "TRN-9");
        assert_eq!(txs[0].account_guid, "ACT-7");
        assert_eq!(txs[0].coordinates(), Some((37.77, -122.41)));
    }

    #[test]
    fn test_bad_coordinate_reports_line() {
        let csv = "date,description,amount,latitude\n2024-01-15,X,-1.00,north\n";
        let err = read_transactions_csv(csv.as_bytes(), Some("ACT-1")).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
