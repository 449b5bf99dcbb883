//! Domain models for txenrich
//!
//! Field names on every serialized type are part of the public JSON contract
//! consumed by web and mobile clients.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Debit/credit indicator supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Debit,
    Credit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "DEBIT",
            Self::Credit => "CREDIT",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DEBIT" => Ok(Self::Debit),
            "CREDIT" => Ok(Self::Credit),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

/// Settlement status supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Posted,
    Pending,
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "POSTED" => Ok(Self::Posted),
            "PENDING" => Ok(Self::Pending),
            _ => Err(format!("Unknown transaction status: {}", s)),
        }
    }
}

/// When a transaction happened: a calendar date, or a timestamp with or without an offset
///
/// Serialized as the same string form it was received in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransactedAt {
    DateTime(DateTime<FixedOffset>),
    /// Wall-clock time as printed on the statement
    Local(NaiveDateTime),
    Date(NaiveDate),
}

impl TransactedAt {
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::DateTime(dt) => dt.date_naive(),
            Self::Local(dt) => dt.date(),
            Self::Date(d) => *d,
        }
    }

    /// Hour of day, only known when a timestamp was supplied
    pub fn hour(&self) -> Option<u32> {
        match self {
            Self::DateTime(dt) => Some(dt.hour()),
            Self::Local(dt) => Some(dt.hour()),
            Self::Date(_) => None,
        }
    }

    pub fn weekday(&self) -> Weekday {
        self.date().weekday()
    }
}

impl From<NaiveDate> for TransactedAt {
    fn from(date: NaiveDate) -> Self {
        Self::Date(date)
    }
}

/// A raw transaction as received from the caller. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub guid: String,
    pub account_guid: String,
    /// Signed amount in minor currency units. Negative = money out.
    pub amount: i64,
    pub description: String,
    pub transacted_at: TransactedAt,
    pub transaction_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    /// Card-network merchant category code (MCC)
    pub merchant_category_code: Option<u32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl RawTransaction {
    /// Coordinates, only when both halves are present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Output of the description cleaner
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CleaningResult {
    pub cleaned: String,
    /// Candidate merchant names, best guess first
    pub merchant_hints: Vec<String>,
    /// State codes and postal codes seen before cleaning
    pub location_hints: Vec<String>,
}

/// A known merchant from the merchant index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Merchant {
    pub guid: String,
    pub name: String,
    pub logo_url: Option<String>,
    pub website_url: Option<String>,
    #[serde(default)]
    pub category_codes: Vec<u32>,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub locations: Vec<MerchantLocation>,
}

/// A physical location of a merchant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantLocation {
    pub guid: String,
    pub merchant_guid: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
}

impl MerchantLocation {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Which matcher strategy produced a merchant match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Exact,
    Pattern,
    CategoryCode,
    /// Also reported when nothing matched
    Fuzzy,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Pattern => "pattern",
            Self::CategoryCode => "category_code",
            Self::Fuzzy => "fuzzy",
        }
    }
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of merchant matching. A null merchant with confidence 0 means "no match".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantMatchResult {
    pub merchant: Option<Merchant>,
    pub location: Option<MerchantLocation>,
    pub confidence: f64,
    pub matched_by: MatchStrategy,
}

impl MerchantMatchResult {
    pub fn no_match() -> Self {
        Self {
            merchant: None,
            location: None,
            confidence: 0.0,
            matched_by: MatchStrategy::Fuzzy,
        }
    }

    pub fn is_match(&self) -> bool {
        self.merchant.is_some()
    }
}

/// A category assignment, always resolved against the taxonomy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPrediction {
    pub category_guid: String,
    pub category_name: String,
    pub confidence: f64,
    pub parent_guid: Option<String>,
    pub parent_name: Option<String>,
}

/// One entry in an account's rolling transaction history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub guid: String,
    pub account_guid: String,
    pub merchant_guid: Option<String>,
    /// Minor currency units, same sign convention as [`RawTransaction::amount`]
    pub amount: i64,
    pub date: NaiveDate,
    pub description: String,
}

/// Recurrence frequency buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Annual,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "WEEKLY",
            Self::Biweekly => "BIWEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Quarterly => "QUARTERLY",
            Self::Annual => "ANNUAL",
        }
    }

    /// Inclusive tolerance band on the mean gap in days
    pub fn band(&self) -> (f64, f64) {
        match self {
            Self::Weekly => (5.0, 9.0),
            Self::Biweekly => (11.0, 17.0),
            Self::Monthly => (25.0, 35.0),
            Self::Quarterly => (80.0, 100.0),
            Self::Annual => (350.0, 380.0),
        }
    }

    /// Bucket a mean inter-occurrence gap; `None` outside every band
    pub fn from_mean_gap(mean_days: f64) -> Option<Self> {
        [
            Self::Weekly,
            Self::Biweekly,
            Self::Monthly,
            Self::Quarterly,
            Self::Annual,
        ]
        .into_iter()
        .find(|f| {
            let (lo, hi) = f.band();
            mean_days >= lo && mean_days <= hi
        })
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "WEEKLY" => Ok(Self::Weekly),
            "BIWEEKLY" => Ok(Self::Biweekly),
            "MONTHLY" => Ok(Self::Monthly),
            "QUARTERLY" => Ok(Self::Quarterly),
            "ANNUAL" => Ok(Self::Annual),
            _ => Err(format!("Unknown frequency: {}", s)),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A repeating charge mined from history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringPattern {
    pub guid: String,
    pub merchant_guid: Option<String>,
    /// Representative amount in minor currency units
    pub amount: i64,
    pub frequency: Frequency,
    pub predicted_next_date: Option<NaiveDate>,
    pub confidence: f64,
    pub occurrence_count: u32,
    pub last_occurrence_date: NaiveDate,
}

/// Pattern detector output for a single transaction
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PatternAnalysis {
    pub pattern: Option<RecurringPattern>,
    pub is_subscription: bool,
    pub is_recurring: bool,
    pub is_bill_pay: bool,
}

/// Who produced an enrichment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Provenance {
    /// This enrichment engine
    #[default]
    System,
    /// A user correction
    User,
    /// Another enrichment system
    ThirdParty,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::User => "USER",
            Self::ThirdParty => "THIRD_PARTY",
        }
    }
}

/// The externally visible enrichment result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTransaction {
    #[serde(flatten)]
    pub transaction: RawTransaction,
    pub cleaned_description: String,
    pub merchant_guid: Option<String>,
    pub merchant_name: Option<String>,
    pub merchant_logo_url: Option<String>,
    pub merchant_website_url: Option<String>,
    pub merchant_location: Option<MerchantLocation>,
    pub merchant_confidence: f64,
    pub merchant_matched_by: MatchStrategy,
    pub category_guid: String,
    pub category_name: String,
    pub parent_category_guid: Option<String>,
    pub parent_category_name: Option<String>,
    pub category_confidence: f64,
    pub is_subscription: bool,
    pub is_recurring: bool,
    pub is_bill_pay: bool,
    pub recurring_pattern: Option<RecurringPattern>,
    pub enriched_by: Provenance,
    pub enriched_at: DateTime<Utc>,
    pub processing_time_ms: f64,
}

impl EnrichedTransaction {
    /// Build an enriched record from the outputs of each pipeline stage
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        transaction: RawTransaction,
        cleaning: CleaningResult,
        merchant_match: MerchantMatchResult,
        category: CategoryPrediction,
        patterns: PatternAnalysis,
        enriched_by: Provenance,
        enriched_at: DateTime<Utc>,
        processing_time_ms: f64,
    ) -> Self {
        let MerchantMatchResult {
            merchant,
            location,
            confidence: merchant_confidence,
            matched_by,
        } = merchant_match;

        Self {
            transaction,
            cleaned_description: cleaning.cleaned,
            merchant_guid: merchant.as_ref().map(|m| m.guid.clone()),
            merchant_name: merchant.as_ref().map(|m| m.name.clone()),
            merchant_logo_url: merchant.as_ref().and_then(|m| m.logo_url.clone()),
            merchant_website_url: merchant.as_ref().and_then(|m| m.website_url.clone()),
            merchant_location: location,
            merchant_confidence: merchant_confidence.clamp(0.0, 1.0),
            merchant_matched_by: matched_by,
            category_guid: category.category_guid,
            category_name: category.category_name,
            parent_category_guid: category.parent_guid,
            parent_category_name: category.parent_name,
            category_confidence: category.confidence.clamp(0.0, 1.0),
            is_subscription: patterns.is_subscription,
            is_recurring: patterns.is_recurring,
            is_bill_pay: patterns.is_bill_pay,
            recurring_pattern: patterns.pattern,
            enriched_by,
            enriched_at,
            processing_time_ms,
        }
    }

    /// The history entry recorded for this transaction under `account_guid`
    pub fn history_entry(&self, account_guid: &str) -> HistoryEntry {
        HistoryEntry {
            guid: self.transaction.guid.clone(),
            account_guid: account_guid.to_string(),
            merchant_guid: self.merchant_guid.clone(),
            amount: self.transaction.amount,
            date: self.transaction.transacted_at.date(),
            description: self.cleaned_description.clone(),
        }
    }
}
