//! Recurring charge detection
//!
//! Groups an account's history by merchant and exact amount, infers a
//! frequency from the mean gap between occurrences and scores how much the
//! group looks like a real recurring charge.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::Duration;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::cleaner;
use crate::models::{Frequency, HistoryEntry, PatternAnalysis, RecurringPattern};

/// Occurrence count at which the count score saturates
const SATURATING_OCCURRENCES: f64 = 6.0;
const COUNT_WEIGHT: f64 = 0.4;
const CONSISTENCY_WEIGHT: f64 = 0.4;
const PLAUSIBILITY_WEIGHT: f64 = 0.2;

/// A pattern above this counts as recurring
pub const RECURRING_THRESHOLD: f64 = 0.75;
/// A monthly pattern above this counts as a subscription even for unknown merchants
pub const SUBSCRIPTION_THRESHOLD: f64 = 0.85;

/// Merchants billed on a subscription basis, matched against merchant id and description
const KNOWN_SUBSCRIPTIONS: &[&str] = &[
    "NETFLIX",
    "HULU",
    "SPOTIFY",
    "DISNEY",
    "HBO",
    "YOUTUBE",
    "PRIME VIDEO",
    "AMAZON PRIME",
    "APPLE SERVICES",
    "PEACOCK",
    "PARAMOUNT",
    "SIRIUSXM",
    "AUDIBLE",
    "PLANET FITNESS",
    "DROPBOX",
    "GITHUB",
    "ADOBE",
];

static BILL_PAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:UTILITY|UTILITIES|ELECTRIC|WATER DEPT|GAS CO|INSURANCE|INS PREM|LOAN|MORTGAGE|BILL ?PAY|BILLPAY|PAYMENT TO)\b",
    )
    .expect("bill pay regex")
});

/// Grouping key: merchant id, or the lowercased description when no merchant resolved
fn group_key(entry: &HistoryEntry) -> String {
    match &entry.merchant_guid {
        Some(guid) => guid.clone(),
        None => entry.description.trim().to_lowercase(),
    }
}

/// Stable id for a pattern: same account, merchant and amount give the same id
pub fn pattern_id(account_guid: &str, merchant_key: &str, amount: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(account_guid.as_bytes());
    hasher.update(b"|");
    hasher.update(merchant_key.as_bytes());
    hasher.update(b"|");
    hasher.update(amount.to_string().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("RP-{}", &digest[..16])
}

fn plausibility(mean_gap: f64) -> f64 {
    if mean_gap < 7.0 {
        0.5
    } else if mean_gap > 365.0 {
        0.7
    } else {
        1.0
    }
}

/// Score one group of same-merchant, same-amount entries (already date-sorted)
fn score_group(account_guid: &str, key: &str, entries: &[&HistoryEntry]) -> Option<RecurringPattern> {
    if entries.len() < 2 {
        return None;
    }

    let gaps: Vec<f64> = entries
        .windows(2)
        .map(|w| (w[1].date - w[0].date).num_days() as f64)
        .collect();
    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;

    let frequency = Frequency::from_mean_gap(mean)?;

    let count_score = (entries.len() as f64 / SATURATING_OCCURRENCES).min(1.0);
    let consistency_score = (1.0 - variance / 10.0).max(0.0);
    let confidence = (COUNT_WEIGHT * count_score
        + CONSISTENCY_WEIGHT * consistency_score
        + PLAUSIBILITY_WEIGHT * plausibility(mean))
    .clamp(0.0, 1.0);

    let last = entries.last()?;
    let amount = last.amount;

    Some(RecurringPattern {
        guid: pattern_id(account_guid, key, amount),
        merchant_guid: last.merchant_guid.clone(),
        amount,
        frequency,
        predicted_next_date: last
            .date
            .checked_add_signed(Duration::days(mean.round() as i64)),
        confidence,
        occurrence_count: entries.len() as u32,
        last_occurrence_date: last.date,
    })
}

/// Every recurring pattern in one account's history, most confident first
///
/// Entries belonging to other accounts are ignored.
pub fn detect_patterns(account_guid: &str, history: &[HistoryEntry]) -> Vec<RecurringPattern> {
    let mut sorted: Vec<&HistoryEntry> = history
        .iter()
        .filter(|e| e.account_guid == account_guid)
        .collect();
    sorted.sort_by_key(|e| e.date);

    let mut groups: BTreeMap<(String, i64), Vec<&HistoryEntry>> = BTreeMap::new();
    for entry in sorted {
        groups
            .entry((group_key(entry), entry.amount))
            .or_default()
            .push(entry);
    }

    let mut patterns: Vec<RecurringPattern> = groups
        .iter()
        .filter_map(|((key, _), entries)| score_group(account_guid, key, entries))
        .collect();
    patterns.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    patterns
}

/// Bill payment wording, independent of history
pub fn is_bill_pay(description: &str) -> bool {
    let upper = description.to_uppercase();
    BILL_PAY_RE.is_match(&upper) && !cleaner::is_transfer(&upper) && !cleaner::is_fee(&upper)
}

pub fn is_known_subscription(merchant_guid: Option<&str>, description: &str) -> bool {
    let description = description.to_uppercase();
    let merchant = merchant_guid.unwrap_or_default().to_uppercase().replace(['-', '_'], " ");
    KNOWN_SUBSCRIPTIONS
        .iter()
        .any(|name| description.contains(name) || merchant.contains(name))
}

/// Analyze one transaction against its account's history
///
/// `current` joins the history unless an entry with the same guid is already
/// there. History entries for other accounts are dropped with a warning.
pub fn analyze(current: &HistoryEntry, raw_description: &str, history: &[HistoryEntry]) -> PatternAnalysis {
    let foreign = history
        .iter()
        .filter(|e| e.account_guid != current.account_guid)
        .count();
    if foreign > 0 {
        warn!(
            account = %current.account_guid,
            foreign,
            "Ignoring history entries from other accounts"
        );
    }

    let mut combined: Vec<HistoryEntry> = history
        .iter()
        .filter(|e| e.account_guid == current.account_guid)
        .cloned()
        .collect();
    if !combined.iter().any(|e| e.guid == current.guid) {
        combined.push(current.clone());
    }

    let patterns = detect_patterns(&current.account_guid, &combined);
    let best = patterns.first().cloned();

    let is_recurring = patterns.iter().any(|p| p.confidence > RECURRING_THRESHOLD);
    let is_subscription = is_known_subscription(current.merchant_guid.as_deref(), raw_description)
        || best.as_ref().is_some_and(|p| {
            p.frequency == Frequency::Monthly && p.confidence > SUBSCRIPTION_THRESHOLD
        });

    PatternAnalysis {
        pattern: best,
        is_subscription,
        is_recurring,
        is_bill_pay: is_bill_pay(raw_description),
    }
}

/// Whether a pattern qualifies for the active-subscriptions list
pub fn is_trackable(pattern: &RecurringPattern) -> bool {
    pattern.frequency == Frequency::Monthly && pattern.confidence > RECURRING_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::history_series;
    use chrono::NaiveDate;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(n)
    }

    fn entry(guid: &str, merchant: Option<&str>, amount: i64, d: i64) -> HistoryEntry {
        HistoryEntry {
            guid: guid.to_string(),
            account_guid: "ACT-1".to_string(),
            merchant_guid: merchant.map(String::from),
            amount,
            date: day(d),
            description: "Netflix".to_string(),
        }
    }

    #[test]
    fn test_netflix_monthly() {
        let history = vec![
            entry("T1", Some("MER-NETFLIX"), -1599, 0),
            entry("T2", Some("MER-NETFLIX"), -1599, 30),
        ];
        let current = entry("T3", Some("MER-NETFLIX"), -1599, 61);
        let analysis = analyze(&current, "NETFLIX.COM", &history);

        let pattern = analysis.pattern.unwrap();
        assert_eq!(pattern.frequency, Frequency::Monthly);
        assert!(pattern.confidence > 0.75);
        assert_eq!(pattern.occurrence_count, 3);
        assert_eq!(pattern.last_occurrence_date, day(61));
        // mean gap 30.5 rounds to 31
        assert_eq!(pattern.predicted_next_date, Some(day(92)));
        assert!(analysis.is_subscription);
        assert!(analysis.is_recurring);
        assert!(!analysis.is_bill_pay);
    }

    #[test]
    fn test_single_occurrence_has_no_pattern() {
        let current = entry("T1", Some("MER-X"), -500, 0);
        let analysis = analyze(&current, "Something", &[]);
        assert!(analysis.pattern.is_none());
        assert!(!analysis.is_recurring);
    }

    #[test]
    fn test_gap_outside_bands() {
        let history = vec![entry("T1", Some("MER-X"), -500, 0), entry("T2", Some("MER-X"), -500, 45)];
        assert!(detect_patterns("ACT-1", &history).is_empty());
    }

    #[test]
    fn test_amount_must_match() {
        let history = vec![
            entry("T1", Some("MER-X"), -500, 0),
            entry("T2", Some("MER-X"), -501, 30),
            entry("T3", Some("MER-X"), -502, 60),
        ];
        assert!(detect_patterns("ACT-1", &history).is_empty());
    }

    #[test]
    fn test_unsorted_input() {
        let history = vec![
            entry("T3", Some("MER-GYM"), -2500, 14),
            entry("T1", Some("MER-GYM"), -2500, 0),
            entry("T2", Some("MER-GYM"), -2500, 7),
        ];
        let patterns = detect_patterns("ACT-1", &history);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].frequency, Frequency::Weekly);
        assert_eq!(patterns[0].last_occurrence_date, day(14));
    }

    #[test]
    fn test_confidence_components() {
        // Six perfectly regular monthly charges saturate every score
        let history: Vec<HistoryEntry> = (0..6)
            .map(|i| entry(&format!("T{}", i), Some("MER-GYM"), -4000, i * 30))
            .collect();
        let patterns = detect_patterns("ACT-1", &history);
        assert!((patterns[0].confidence - 1.0).abs() < 1e-9);

        // Irregular gaps lose the consistency score entirely
        let history = vec![
            entry("T1", Some("MER-GYM"), -4000, 0),
            entry("T2", Some("MER-GYM"), -4000, 25),
            entry("T3", Some("MER-GYM"), -4000, 60),
        ];
        let p = &detect_patterns("ACT-1", &history)[0];
        assert_eq!(p.frequency, Frequency::Monthly);
        assert!((p.confidence - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_keeps_highest_confidence_group() {
        let mut history = history_series("MER-GYM", -4000, day(0), &[0, 30, 60, 90, 120, 150]);
        history.push(entry("N1", Some("MER-NETFLIX"), -1599, 0));
        history.push(entry("N2", Some("MER-NETFLIX"), -1599, 30));
        let current = entry("N3", Some("MER-NETFLIX"), -1599, 61);

        let analysis = analyze(&current, "Netflix", &history);
        assert_eq!(analysis.pattern.unwrap().merchant_guid.as_deref(), Some("MER-GYM"));
    }

    #[test]
    fn test_unknown_merchant_monthly_subscription() {
        let history: Vec<HistoryEntry> = (0..5)
            .map(|i| entry(&format!("T{}", i), Some("MER-LOCAL-CLUB"), -3000, i * 30))
            .collect();
        let current = entry("T5", Some("MER-LOCAL-CLUB"), -3000, 150);
        let analysis = analyze(&current, "Local Club Dues", &history);
        assert!(analysis.pattern.as_ref().unwrap().confidence > 0.85);
        assert!(analysis.is_subscription);
    }

    #[test]
    fn test_foreign_history_ignored() {
        let mut other = entry("T1", Some("MER-NETFLIX"), -1599, 0);
        other.account_guid = "ACT-2".to_string();
        let mut other2 = entry("T2", Some("MER-NETFLIX"), -1599, 30);
        other2.account_guid = "ACT-2".to_string();
        let current = entry("T3", Some("MER-NETFLIX"), -1599, 61);

        let analysis = analyze(&current, "Netflix", &[other, other2]);
        assert!(analysis.pattern.is_none());
    }

    #[test]
    fn test_description_key_without_merchant() {
        let history = vec![entry("T1", None, -900, 0), entry("T2", None, -900, 14)];
        let patterns = detect_patterns("ACT-1", &history);
        assert_eq!(patterns[0].frequency, Frequency::Biweekly);
        assert!(patterns[0].merchant_guid.is_none());
    }

    #[test]
    fn test_pattern_id_stable() {
        let a = pattern_id("ACT-1", "MER-NETFLIX", -1599);
        assert_eq!(a, pattern_id("ACT-1", "MER-NETFLIX", -1599));
        assert_ne!(a, pattern_id("ACT-2", "MER-NETFLIX", -1599));
        assert!(a.starts_with("RP-"));
        assert_eq!(a.len(), 19);
    }

    #[test]
    fn test_bill_pay() {
        assert!(is_bill_pay("PG&E ELECTRIC BILL PAY"));
        assert!(is_bill_pay("Online Payment To State Farm Insurance"));
        assert!(is_bill_pay("NAVIENT LOAN"));
        assert!(!is_bill_pay("ZELLE PAYMENT TO JOHN"));
        assert!(!is_bill_pay("LATE FEE LOAN"));
        assert!(!is_bill_pay("STARBUCKS"));
    }

    #[test]
    fn test_known_subscription() {
        assert!(is_known_subscription(Some("MER-NETFLIX"), "whatever"));
        assert!(is_known_subscription(None, "SPOTIFY USA"));
        assert!(!is_known_subscription(Some("MER-KROGER"), "KROGER #12"));
    }
}
