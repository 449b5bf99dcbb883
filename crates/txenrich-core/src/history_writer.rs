//! Fire-and-forget history persistence
//!
//! The request path hands entries to a bounded queue and returns
//! immediately. A single background task drains the queue, appends to the
//! store and feeds the subscription tracker. A full queue drops the write.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::db::Database;
use crate::models::{HistoryEntry, RecurringPattern};
use crate::subscriptions::SubscriptionTracker;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

enum Job {
    Append {
        entry: HistoryEntry,
        pattern: Option<RecurringPattern>,
    },
    Flush(oneshot::Sender<()>),
}

/// Handle to the background writer; cheap to clone
#[derive(Clone)]
pub struct HistoryWriter {
    tx: mpsc::Sender<Job>,
}

impl HistoryWriter {
    /// Start the drain task on the current tokio runtime
    pub fn spawn(
        db: Database,
        tracker: Arc<SubscriptionTracker>,
        retention_days: u32,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Job>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    Job::Append { entry, pattern } => {
                        let db = db.clone();
                        let tracker = tracker.clone();
                        let result = tokio::task::spawn_blocking(move || {
                            let cutoff =
                                Utc::now().date_naive() - Duration::days(i64::from(retention_days));
                            db.append_history(&entry, cutoff)?;
                            tracker.invalidate(&entry.account_guid);
                            if let Some(pattern) = pattern {
                                tracker.record(&entry.account_guid, &pattern)?;
                            }
                            Ok::<_, crate::error::Error>(entry.account_guid)
                        })
                        .await;

                        match result {
                            Ok(Ok(account)) => debug!(account = %account, "History appended"),
                            Ok(Err(e)) => warn!("History append failed: {}", e),
                            Err(e) => warn!("History append task panicked: {}", e),
                        }
                    }
                    Job::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("History writer stopped");
        });

        (Self { tx }, handle)
    }

    /// Queue an entry; returns false when the write was dropped
    pub fn submit(&self, entry: HistoryEntry, pattern: Option<RecurringPattern>) -> bool {
        match self.tx.try_send(Job::Append { entry, pattern }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("History queue full, dropping write");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("History writer stopped, dropping write");
                false
            }
        }
    }

    /// Wait until everything queued before this call has been processed
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Job::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Frequency;
    use chrono::NaiveDate;

    fn entry(guid: &str, date: NaiveDate) -> HistoryEntry {
        HistoryEntry {
            guid: guid.to_string(),
            account_guid: "ACT-1".to_string(),
            merchant_guid: Some("MER-NETFLIX".to_string()),
            amount: -1599,
            date,
            description: "Netflix".to_string(),
        }
    }

    fn setup() -> (Database, Arc<SubscriptionTracker>) {
        let db = Database::in_memory().unwrap();
        let tracker = Arc::new(SubscriptionTracker::new(
            db.clone(),
            std::time::Duration::from_secs(60),
        ));
        (db, tracker)
    }

    #[tokio::test]
    async fn test_append_and_flush() {
        let (db, tracker) = setup();
        let (writer, _handle) = HistoryWriter::spawn(db.clone(), tracker, 90, 16);
        let today = Utc::now().date_naive();

        assert!(writer.submit(entry("T1", today), None));
        writer.flush().await;

        let history = db.get_history("ACT-1").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].guid, "T1");
    }

    #[tokio::test]
    async fn test_old_entries_trimmed() {
        let (db, tracker) = setup();
        let (writer, _handle) = HistoryWriter::spawn(db.clone(), tracker, 90, 16);
        let today = Utc::now().date_naive();

        writer.submit(entry("OLD", today - Duration::days(120)), None);
        writer.submit(entry("NEW", today), None);
        writer.flush().await;

        let history = db.get_history("ACT-1").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].guid, "NEW");
    }

    #[tokio::test]
    async fn test_feeds_tracker() {
        let (db, tracker) = setup();
        let (writer, _handle) = HistoryWriter::spawn(db.clone(), tracker.clone(), 90, 16);
        let today = Utc::now().date_naive();

        let pattern = RecurringPattern {
            guid: "RP-TEST".to_string(),
            merchant_guid: Some("MER-NETFLIX".to_string()),
            amount: -1599,
            frequency: Frequency::Monthly,
            predicted_next_date: None,
            confidence: 0.8,
            occurrence_count: 3,
            last_occurrence_date: today,
        };
        writer.submit(entry("T1", today), Some(pattern));
        writer.flush().await;

        assert_eq!(db.list_tracked_subscriptions("ACT-1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        // No drain task: the single slot fills and stays full
        let (tx, _rx) = mpsc::channel::<Job>(1);
        let writer = HistoryWriter { tx };
        let today = Utc::now().date_naive();
        assert!(writer.submit(entry("T1", today), None));
        assert!(!writer.submit(entry("T2", today), None));
    }
}
