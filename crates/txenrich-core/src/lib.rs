//! txenrich Core Library
//!
//! Transaction enrichment engine shared by the HTTP service and the CLI:
//! - Description cleaning and merchant matching
//! - Rule-based categorization with a pluggable classifier fallback
//! - Recurring pattern and subscription detection
//! - Encrypted SQLite storage for merchants, history and subscriptions
//! - Orchestration of the full pipeline, single and batch

pub mod cache;
pub mod categorizer;
pub mod cleaner;
pub mod config;
pub mod db;
pub mod enrich;
pub mod error;
pub mod history_writer;
pub mod import;
pub mod matcher;
pub mod models;
pub mod patterns;
pub mod seed;
pub mod subscriptions;
pub mod taxonomy;

/// Fixture builders and seeded databases
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use categorizer::{
    load_classifier, CategoryClassifier, Categorizer, LinearClassifier, MockClassifier,
    NullClassifier,
};
pub use config::EnrichConfig;
pub use db::Database;
pub use enrich::{EnrichStatus, Enricher};
pub use error::{Error, Result};
pub use matcher::{MerchantIndex, MerchantMatcher};
pub use models::{
    CategoryPrediction, CleaningResult, EnrichedTransaction, Frequency, HistoryEntry,
    MatchStrategy, Merchant, MerchantLocation, MerchantMatchResult, PatternAnalysis, Provenance,
    RawTransaction, RecurringPattern, TransactedAt,
};
pub use subscriptions::SubscriptionTracker;
