//! Active subscription tracking per account
//!
//! The listing merges patterns mined from stored history with patterns
//! recorded by the tracker, minus the ones the account cancelled. Listings
//! are cached per account and invalidated whenever that account's history or
//! tracked set changes.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::TtlCache;
use crate::db::Database;
use crate::error::Result;
use crate::models::RecurringPattern;
use crate::patterns::{detect_patterns, is_trackable};

pub struct SubscriptionTracker {
    db: Database,
    listings: TtlCache<String, Arc<Vec<RecurringPattern>>>,
}

impl SubscriptionTracker {
    pub fn new(db: Database, cache_ttl: Duration) -> Self {
        Self {
            db,
            listings: TtlCache::new(cache_ttl),
        }
    }

    /// Persist a pattern if it qualifies; returns whether it was recorded
    pub fn record(&self, account_guid: &str, pattern: &RecurringPattern) -> Result<bool> {
        if !is_trackable(pattern) {
            return Ok(false);
        }
        self.db.track_subscription(account_guid, pattern)?;
        self.invalidate(account_guid);
        debug!(account = %account_guid, pattern = %pattern.guid, "Tracked subscription");
        Ok(true)
    }

    /// Active subscriptions for an account, most confident first
    pub fn list(&self, account_guid: &str) -> Result<Arc<Vec<RecurringPattern>>> {
        self.listings
            .get_or_try_insert(account_guid.to_string(), || {
                self.load(account_guid).map(Arc::new)
            })
    }

    fn load(&self, account_guid: &str) -> Result<Vec<RecurringPattern>> {
        let cancelled = self.db.cancelled_subscription_ids(account_guid)?;
        let history = self.db.get_history(account_guid)?;
        let mut merged: Vec<RecurringPattern> = detect_patterns(account_guid, &history)
            .into_iter()
            .filter(is_trackable)
            .filter(|p| !cancelled.contains(&p.guid))
            .collect();

        for tracked in self.db.list_tracked_subscriptions(account_guid)? {
            if !cancelled.contains(&tracked.guid) && !merged.iter().any(|p| p.guid == tracked.guid) {
                merged.push(tracked);
            }
        }

        merged.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Ok(merged)
    }

    /// Cancel a listed or tracked pattern; false when the account has neither
    ///
    /// The pattern stays hidden even while its charges remain in history. A
    /// changed amount yields a new pattern id and is listed again.
    pub fn cancel(&self, account_guid: &str, pattern_guid: &str) -> Result<bool> {
        let listed = self.list(account_guid)?.iter().any(|p| p.guid == pattern_guid);
        let deleted = self.db.cancel_tracked_subscription(account_guid, pattern_guid)?;
        if !listed && !deleted {
            return Ok(false);
        }

        self.db.suppress_subscription(account_guid, pattern_guid)?;
        self.invalidate(account_guid);
        info!(account = %account_guid, pattern = %pattern_guid, "Cancelled subscription");
        Ok(true)
    }

    pub fn invalidate(&self, account_guid: &str) {
        self.listings.invalidate(&account_guid.to_string());
    }
}
