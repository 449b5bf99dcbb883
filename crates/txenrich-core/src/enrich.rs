//! Enrichment orchestration
//!
//! Sequences cleaner, merchant matcher, categorizer and pattern detector for
//! one transaction, assembles the enriched record and hands history off to
//! the background writer. Batch enrichment runs the same pipeline per item
//! in parallel and never persists history.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::categorizer::{load_classifier, CategorizeInput, CategoryClassifier, Categorizer};
use crate::cleaner;
use crate::config::EnrichConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::history_writer::{HistoryWriter, DEFAULT_QUEUE_CAPACITY};
use crate::matcher::MerchantMatcher;
use crate::models::{
    EnrichedTransaction, HistoryEntry, Merchant, MerchantMatchResult, PatternAnalysis, Provenance,
    RawTransaction, RecurringPattern,
};
use crate::patterns::{self, is_trackable};
use crate::subscriptions::SubscriptionTracker;

/// Counts reported by `status`
#[derive(Debug, Clone, serde::Serialize)]
pub struct EnrichStatus {
    pub merchants: i64,
    pub history_accounts: i64,
    pub history_entries: i64,
    pub classifier: String,
    pub encrypted: bool,
}

pub struct Enricher {
    db: Database,
    config: EnrichConfig,
    matcher: MerchantMatcher,
    categorizer: Categorizer,
    tracker: Arc<SubscriptionTracker>,
    writer: Option<HistoryWriter>,
}

impl Enricher {
    pub fn new(db: Database, config: EnrichConfig, classifier: Arc<dyn CategoryClassifier>) -> Self {
        let db = db.with_lookup_timeout(config.lookup_timeout());
        let matcher = MerchantMatcher::with_settings(
            Arc::new(db.clone()),
            config.fuzzy_threshold,
            config.cache_ttl(),
        );
        let tracker = Arc::new(SubscriptionTracker::new(db.clone(), config.cache_ttl()));

        Self {
            db,
            config,
            matcher,
            categorizer: Categorizer::new(classifier),
            tracker,
            writer: None,
        }
    }

    /// Build from config, loading the classifier model if one is configured
    pub fn from_config(db: Database, config: EnrichConfig) -> Self {
        let classifier = load_classifier(config.classifier_model.as_deref());
        Self::new(db, config, classifier)
    }

    /// Persist single-transaction history through a background task
    ///
    /// Must be called inside a tokio runtime.
    pub fn with_history_writer(mut self) -> Self {
        let (writer, _handle) = HistoryWriter::spawn(
            self.db.clone(),
            self.tracker.clone(),
            self.config.history_retention_days,
            DEFAULT_QUEUE_CAPACITY,
        );
        self.writer = Some(writer);
        self
    }

    pub fn config(&self) -> &EnrichConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Wait for queued history writes (no-op without a writer)
    pub async fn flush_history(&self) {
        if let Some(writer) = &self.writer {
            writer.flush().await;
        }
    }

    fn validate(tx: &RawTransaction) -> Result<()> {
        if tx.guid.trim().is_empty() {
            return Err(Error::InvalidInput("transaction guid is required".into()));
        }
        if tx.account_guid.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "transaction {} has no account_guid",
                tx.guid
            )));
        }
        match (tx.latitude, tx.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                    return Err(Error::InvalidInput(format!(
                        "transaction {} has out-of-range coordinates",
                        tx.guid
                    )));
                }
            }
            (None, None) => {}
            _ => {
                return Err(Error::InvalidInput(format!(
                    "transaction {} must supply both latitude and longitude",
                    tx.guid
                )));
            }
        }
        Ok(())
    }

    /// The pipeline proper; `history` is empty when none is available
    fn run(&self, tx: RawTransaction, account_guid: &str, history: &[HistoryEntry]) -> EnrichedTransaction {
        let started = Instant::now();

        let cleaning = cleaner::clean(&tx.description);

        let merchant_match: MerchantMatchResult = self.matcher.match_merchant(
            &cleaning.merchant_hints,
            tx.merchant_category_code,
            tx.coordinates(),
        );

        let category = self.categorizer.categorize(&CategorizeInput {
            description: &cleaning.cleaned,
            merchant_name: merchant_match.merchant.as_ref().map(|m| m.name.as_str()),
            category_code: tx.merchant_category_code,
            amount: tx.amount,
            weekday: tx.transacted_at.weekday(),
            hour: tx.transacted_at.hour(),
        });

        let analysis = if history.is_empty() {
            PatternAnalysis {
                is_subscription: patterns::is_known_subscription(
                    merchant_match.merchant.as_ref().map(|m| m.guid.as_str()),
                    &tx.description,
                ),
                is_bill_pay: patterns::is_bill_pay(&tx.description),
                ..PatternAnalysis::default()
            }
        } else {
            let current = HistoryEntry {
                guid: tx.guid.clone(),
                account_guid: account_guid.to_string(),
                merchant_guid: merchant_match.merchant.as_ref().map(|m| m.guid.clone()),
                amount: tx.amount,
                date: tx.transacted_at.date(),
                description: cleaning.cleaned.clone(),
            };
            patterns::analyze(&current, &tx.description, history)
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        debug!(
            tx = %tx.guid,
            merchant = ?merchant_match.merchant.as_ref().map(|m| &m.guid),
            category = %category.category_guid,
            elapsed_ms,
            "Enriched transaction"
        );

        EnrichedTransaction::assemble(
            tx,
            cleaning,
            merchant_match,
            category,
            analysis,
            Provenance::System,
            Utc::now(),
            elapsed_ms,
        )
    }

    /// Stored history for an account, or nothing if the store is unavailable
    fn stored_history(&self, account_guid: &str) -> Vec<HistoryEntry> {
        match self.db.get_history(account_guid) {
            Ok(history) => history,
            Err(e) => {
                warn!(account = %account_guid, "History unavailable, skipping pattern detection: {}", e);
                Vec::new()
            }
        }
    }

    /// Enrich one transaction without persisting anything
    ///
    /// Uses `history` when supplied, otherwise the account's stored history.
    pub fn enrich_sync(
        &self,
        tx: RawTransaction,
        account_guid: Option<&str>,
        history: Option<&[HistoryEntry]>,
    ) -> Result<EnrichedTransaction> {
        Self::validate(&tx)?;
        let account = account_guid.unwrap_or(&tx.account_guid).to_string();

        let enriched = match history {
            Some(history) => self.run(tx, &account, history),
            None => {
                let stored = self.stored_history(&account);
                self.run(tx, &account, &stored)
            }
        };
        Ok(enriched)
    }

    /// Single-transaction path: enrich, then queue the history append
    pub async fn enrich(
        self: &Arc<Self>,
        tx: RawTransaction,
        account_guid: Option<String>,
        history: Option<Vec<HistoryEntry>>,
    ) -> Result<EnrichedTransaction> {
        let this = self.clone();
        let account = account_guid.clone();
        let enriched = tokio::task::spawn_blocking(move || {
            this.enrich_sync(tx, account.as_deref(), history.as_deref())
        })
        .await
        .map_err(|e| Error::Task(e.to_string()))??;

        if let Some(writer) = &self.writer {
            let account = account_guid.unwrap_or_else(|| enriched.transaction.account_guid.clone());
            let pattern: Option<RecurringPattern> =
                enriched.recurring_pattern.clone().filter(is_trackable);
            writer.submit(enriched.history_entry(&account), pattern);
        }

        Ok(enriched)
    }

    /// Batch path: same pipeline per item, in parallel, results in input order
    ///
    /// Every item is validated before any work starts. Only `history` is used
    /// for pattern detection and nothing is persisted.
    pub async fn enrich_batch(
        self: &Arc<Self>,
        transactions: Vec<RawTransaction>,
        account_guid: Option<String>,
        history: Vec<HistoryEntry>,
    ) -> Result<Vec<EnrichedTransaction>> {
        if transactions.len() > self.config.max_batch_size {
            return Err(Error::InvalidInput(format!(
                "batch of {} exceeds the limit of {}",
                transactions.len(),
                self.config.max_batch_size
            )));
        }
        for tx in &transactions {
            Self::validate(tx)?;
        }

        let history = Arc::new(history);
        let handles: Vec<_> = transactions
            .into_iter()
            .map(|tx| {
                let this = self.clone();
                let history = history.clone();
                let account = account_guid.clone();
                tokio::task::spawn_blocking(move || {
                    let account = account.unwrap_or_else(|| tx.account_guid.clone());
                    this.run(tx, &account, &history)
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.map_err(|e| Error::Task(e.to_string()))?);
        }

        info!(count = results.len(), "Enriched batch");
        Ok(results)
    }

    /// Free-text merchant lookup, matcher only
    pub fn search_merchant(&self, query: &str) -> MerchantMatchResult {
        self.matcher
            .match_merchant(&[query.trim().to_string()], None, None)
    }

    pub fn get_merchant(&self, guid: &str) -> Result<Option<Merchant>> {
        self.db.get_merchant(guid)
    }

    /// Active subscriptions; an unavailable store yields an empty list
    pub fn list_subscriptions(&self, account_guid: &str) -> Vec<RecurringPattern> {
        match self.tracker.list(account_guid) {
            Ok(list) => list.as_ref().clone(),
            Err(e) => {
                warn!(account = %account_guid, "Subscription listing unavailable: {}", e);
                Vec::new()
            }
        }
    }

    pub fn cancel_subscription(&self, account_guid: &str, pattern_guid: &str) -> Result<bool> {
        self.tracker.cancel(account_guid, pattern_guid)
    }

    /// Load merchants into the index and refresh the fuzzy name list
    pub fn seed(&self, merchants: &[Merchant]) -> Result<usize> {
        let count = self.db.seed_merchants(merchants)?;
        self.matcher.invalidate_names();
        info!(count, "Seeded merchants");
        Ok(count)
    }

    /// Apply the retention window to every account
    pub fn prune_history(&self) -> Result<usize> {
        let cutoff = Utc::now().date_naive()
            - chrono::Duration::days(i64::from(self.config.history_retention_days));
        let deleted = self.db.prune_history(cutoff)?;
        info!(deleted, %cutoff, "Pruned history");
        Ok(deleted)
    }

    pub fn status(&self) -> Result<EnrichStatus> {
        Ok(EnrichStatus {
            merchants: self.db.count_merchants()?,
            history_accounts: self.db.count_history_accounts()?,
            history_entries: self.db.count_history_entries()?,
            classifier: self.categorizer.classifier().name().to_string(),
            encrypted: self.db.is_encrypted(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorizer::{MockClassifier, NullClassifier};
    use crate::models::{MatchStrategy, TransactedAt};
    use crate::taxonomy;
    use crate::test_utils::{raw_tx, seeded_db};
    use chrono::NaiveDate;

    fn enricher() -> Arc<Enricher> {
        Arc::new(Enricher::new(
            seeded_db(),
            EnrichConfig::default(),
            Arc::new(NullClassifier),
        ))
    }

    #[test]
    fn test_validation() {
        let e = enricher();
        let mut tx = raw_tx("T1", "NETFLIX.COM", -1599);
        tx.guid = " ".into();
        assert!(matches!(e.enrich_sync(tx, None, None), Err(Error::InvalidInput(_))));

        let mut tx = raw_tx("T1", "NETFLIX.COM", -1599);
        tx.latitude = Some(37.0);
        assert!(e.enrich_sync(tx, None, None).is_err());

        let mut tx = raw_tx("T1", "NETFLIX.COM", -1599);
        tx.latitude = Some(95.0);
        tx.longitude = Some(0.0);
        assert!(e.enrich_sync(tx, None, None).is_err());
    }

    #[test]
    fn test_known_merchant_end_to_end() {
        let e = enricher();
        let out = e
            .enrich_sync(raw_tx("T1", "NETFLIX.COM 866-579-7172 CA", -1599), None, Some(&[]))
            .unwrap();
        assert_eq!(out.cleaned_description, "Netflix");
        assert_eq!(out.merchant_guid.as_deref(), Some("MER-NETFLIX"));
        assert_eq!(out.merchant_matched_by, MatchStrategy::Exact);
        assert_eq!(out.category_guid, "CAT-ENTERTAINMENT-STREAMING");
        assert!(out.is_subscription);
        assert!(out.recurring_pattern.is_none());
        assert_eq!(out.enriched_by, Provenance::System);
    }

    #[test]
    fn test_unknown_everything() {
        let e = enricher();
        let mut tx = raw_tx("T1", "ZQXW VBNM", -1234);
        tx.merchant_category_code = Some(1234);
        let out = e.enrich_sync(tx, None, Some(&[])).unwrap();
        assert!(out.merchant_guid.is_none());
        assert_eq!(out.merchant_confidence, 0.0);
        assert_eq!(out.category_guid, taxonomy::UNCATEGORIZED);
        assert_eq!(out.category_confidence, 0.0);
    }

    #[test]
    fn test_overdraft_skips_classifier() {
        let mock = Arc::new(MockClassifier::new("CAT-SOFTWARE", 0.99));
        let e = Enricher::new(seeded_db(), EnrichConfig::default(), mock.clone());
        let out = e.enrich_sync(raw_tx("T1", "OVERDRAFT FEE", 3500), None, Some(&[])).unwrap();
        assert_eq!(out.category_guid, "CAT-FEES-BANK");
        assert!(out.category_confidence >= 0.9);
        assert_eq!(mock.calls(), 0);
    }

    #[test]
    fn test_supplied_history_detects_pattern() {
        let e = enricher();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let history: Vec<HistoryEntry> = [0, 30]
            .iter()
            .enumerate()
            .map(|(i, d)| HistoryEntry {
                guid: format!("H{}", i),
                account_guid: "ACT-1".into(),
                merchant_guid: Some("MER-NETFLIX".into()),
                amount: -1599,
                date: start + chrono::Duration::days(*d),
                description: "Netflix".into(),
            })
            .collect();

        let mut tx = raw_tx("T3", "NETFLIX.COM", -1599);
        tx.transacted_at = TransactedAt::Date(start + chrono::Duration::days(61));
        let out = e.enrich_sync(tx, None, Some(&history)).unwrap();
        let pattern = out.recurring_pattern.unwrap();
        assert_eq!(pattern.frequency, crate::models::Frequency::Monthly);
        assert!(out.is_recurring);
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_matches_single() {
        let e = enricher();
        let txs = vec![
            raw_tx("T1", "STARBUCKS #1234 SEATTLE WA", -550),
            raw_tx("T2", "OVERDRAFT FEE", -3500),
            raw_tx("T3", "AMZN MKTP US*2X3Y4Z5W6", -4299),
        ];

        let batch = e.enrich_batch(txs.clone(), None, Vec::new()).await.unwrap();
        assert_eq!(batch.len(), 3);
        for (tx, out) in txs.iter().zip(&batch) {
            assert_eq!(out.transaction.guid, tx.guid);
            let single = e.enrich_sync(tx.clone(), None, Some(&[])).unwrap();
            assert_eq!(single.merchant_guid, out.merchant_guid);
            assert_eq!(single.category_guid, out.category_guid);
            assert_eq!(single.cleaned_description, out.cleaned_description);
        }
    }

    #[tokio::test]
    async fn test_batch_limit_and_validation() {
        let mut config = EnrichConfig::default();
        config.max_batch_size = 1;
        let e = Arc::new(Enricher::new(seeded_db(), config, Arc::new(NullClassifier)));
        let txs = vec![raw_tx("T1", "A", -1), raw_tx("T2", "B", -1)];
        assert!(e.enrich_batch(txs, None, Vec::new()).await.is_err());

        let e = enricher();
        let mut bad = raw_tx("T2", "B", -1);
        bad.account_guid = String::new();
        let txs = vec![raw_tx("T1", "A", -1), bad];
        assert!(matches!(
            e.enrich_batch(txs, None, Vec::new()).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_single_path_persists_history() {
        let e = Arc::new(
            Enricher::new(seeded_db(), EnrichConfig::default(), Arc::new(NullClassifier))
                .with_history_writer(),
        );
        let mut tx = raw_tx("T1", "NETFLIX.COM", -1599);
        tx.transacted_at = TransactedAt::Date(Utc::now().date_naive());
        e.enrich(tx, None, None).await.unwrap();
        e.flush_history().await;

        let history = e.database().get_history("ACT-1").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].merchant_guid.as_deref(), Some("MER-NETFLIX"));
    }

    #[tokio::test]
    async fn test_batch_does_not_persist() {
        let e = Arc::new(
            Enricher::new(seeded_db(), EnrichConfig::default(), Arc::new(NullClassifier))
                .with_history_writer(),
        );
        let mut tx = raw_tx("T1", "NETFLIX.COM", -1599);
        tx.transacted_at = TransactedAt::Date(Utc::now().date_naive());
        e.enrich_batch(vec![tx], None, Vec::new()).await.unwrap();
        e.flush_history().await;
        assert!(e.database().get_history("ACT-1").unwrap().is_empty());
    }

    #[test]
    fn test_search_merchant() {
        let e = enricher();
        let result = e.search_merchant("  starbucks ");
        assert_eq!(result.merchant.unwrap().guid, "MER-STARBUCKS");
        assert!(!e.search_merchant("qqqqqqq").is_match());
    }

    #[test]
    fn test_status() {
        let e = enricher();
        let status = e.status().unwrap();
        assert!(status.merchants > 0);
        assert_eq!(status.history_accounts, 0);
        assert_eq!(status.classifier, "none");
    }
}
