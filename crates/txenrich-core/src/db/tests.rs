//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{history_entry, sample_location, sample_merchant, TEST_ACCOUNT};
    use chrono::NaiveDate;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n)
    }

    fn pattern(guid: &str, confidence: f64) -> RecurringPattern {
        RecurringPattern {
            guid: guid.to_string(),
            merchant_guid: Some("MER-NETFLIX".to_string()),
            amount: -1599,
            frequency: Frequency::Monthly,
            predicted_next_date: Some(day(91)),
            confidence,
            occurrence_count: 3,
            last_occurrence_date: day(61),
        }
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.count_merchants().unwrap(), 0);
        assert_eq!(db.count_history_entries().unwrap(), 0);
        assert!(!db.is_encrypted());
    }

    #[test]
    fn test_merchant_roundtrip_with_locations() {
        let db = Database::in_memory().unwrap();
        let mut m = sample_merchant("MER-BLUE", "Blue Bottle Coffee");
        m.category_codes = vec![5814];
        m.patterns = vec!["blue bottle".into()];
        m.locations = vec![sample_location("LOC-1", "MER-BLUE", 37.77, -122.41)];
        db.upsert_merchant(&m).unwrap();

        let loaded = db.get_merchant("MER-BLUE").unwrap().unwrap();
        assert_eq!(loaded, m);
        assert_eq!(db.list_merchant_locations("MER-BLUE").unwrap().len(), 1);
        assert!(db.get_merchant("MER-NONE").unwrap().is_none());
    }

    #[test]
    fn test_merchant_keys() {
        let db = Database::in_memory().unwrap();
        let mut m = sample_merchant("MER-TJ", "Trader Joe's");
        m.patterns = vec!["TRADER JOE".into()];
        m.category_codes = vec![5411];
        db.upsert_merchant(&m).unwrap();

        assert_eq!(
            db.find_merchant_by_name("trader joes").unwrap().unwrap().guid,
            "MER-TJ"
        );
        assert_eq!(
            db.find_merchant_by_pattern("trader joe").unwrap().unwrap().guid,
            "MER-TJ"
        );
        assert_eq!(
            db.find_merchant_by_category_code(5411).unwrap().unwrap().guid,
            "MER-TJ"
        );
        assert!(db.find_merchant_by_category_code(5812).unwrap().is_none());
    }

    #[test]
    fn test_category_code_first_registered_wins() {
        let db = Database::in_memory().unwrap();
        let mut first = sample_merchant("MER-A", "Alpha");
        first.category_codes = vec![4899];
        let mut second = sample_merchant("MER-B", "Beta");
        second.category_codes = vec![4899];
        db.seed_merchants(&[first, second]).unwrap();

        assert_eq!(
            db.find_merchant_by_category_code(4899).unwrap().unwrap().guid,
            "MER-A"
        );
    }

    #[test]
    fn test_upsert_rebuilds_keys() {
        let db = Database::in_memory().unwrap();
        let mut m = sample_merchant("MER-X", "Old Name");
        m.patterns = vec!["old pattern".into()];
        db.upsert_merchant(&m).unwrap();

        m.name = "New Name".into();
        m.patterns = vec!["new pattern".into()];
        db.upsert_merchant(&m).unwrap();

        assert!(db.find_merchant_by_name("old name").unwrap().is_none());
        assert!(db.find_merchant_by_pattern("old pattern").unwrap().is_none());
        assert!(db.find_merchant_by_name("new name").unwrap().is_some());
        assert_eq!(db.count_merchants().unwrap(), 1);
        assert_eq!(db.list_merchant_names().unwrap(), vec![("New Name".to_string(), "MER-X".to_string())]);
    }

    #[test]
    fn test_upsert_rejects_blank() {
        let db = Database::in_memory().unwrap();
        assert!(db.upsert_merchant(&sample_merchant("", "Nameless")).is_err());
        assert!(db.upsert_merchant(&sample_merchant("MER-1", "  ")).is_err());
    }

    #[test]
    fn test_history_append_and_order() {
        let db = Database::in_memory().unwrap();
        db.append_history(&history_entry("T2", Some("MER-A"), -100, day(30)), day(0))
            .unwrap();
        db.append_history(&history_entry("T1", Some("MER-A"), -100, day(0)), day(0))
            .unwrap();

        let history = db.get_history(TEST_ACCOUNT).unwrap();
        let guids: Vec<_> = history.iter().map(|e| e.guid.as_str()).collect();
        assert_eq!(guids, vec!["T1", "T2"]);
        assert!(db.get_history("ACT-OTHER").unwrap().is_empty());
    }

    #[test]
    fn test_history_reappend_replaces() {
        let db = Database::in_memory().unwrap();
        let mut entry = history_entry("T1", Some("MER-A"), -100, day(5));
        db.append_history(&entry, day(0)).unwrap();
        entry.amount = -250;
        db.append_history(&entry, day(0)).unwrap();

        let history = db.get_history(TEST_ACCOUNT).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount, -250);
    }

    #[test]
    fn test_history_window_trimmed_on_append() {
        let db = Database::in_memory().unwrap();
        db.append_history(&history_entry("OLD", None, -100, day(0)), day(0))
            .unwrap();
        db.append_history(&history_entry("NEW", None, -100, day(100)), day(10))
            .unwrap();

        let history = db.get_history(TEST_ACCOUNT).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].guid, "NEW");
    }

    #[test]
    fn test_history_requires_account() {
        let db = Database::in_memory().unwrap();
        let mut entry = history_entry("T1", None, -100, day(0));
        entry.account_guid = String::new();
        assert!(db.append_history(&entry, day(0)).is_err());
    }

    #[test]
    fn test_prune_history_all_accounts() {
        let db = Database::in_memory().unwrap();
        let mut other = history_entry("T9", None, -100, day(0));
        other.account_guid = "ACT-2".into();
        db.append_history(&other, day(0)).unwrap();
        db.append_history(&history_entry("T1", None, -100, day(0)), day(0))
            .unwrap();
        db.append_history(&history_entry("T2", None, -100, day(50)), day(0))
            .unwrap();

        assert_eq!(db.count_history_accounts().unwrap(), 2);
        assert_eq!(db.prune_history(day(10)).unwrap(), 2);
        assert_eq!(db.count_history_entries().unwrap(), 1);
        assert_eq!(db.count_history_accounts().unwrap(), 1);
    }

    #[test]
    fn test_tracked_subscriptions() {
        let db = Database::in_memory().unwrap();
        db.track_subscription(TEST_ACCOUNT, &pattern("RP-LOW", 0.8)).unwrap();
        db.track_subscription(TEST_ACCOUNT, &pattern("RP-HIGH", 0.95)).unwrap();

        let listed = db.list_tracked_subscriptions(TEST_ACCOUNT).unwrap();
        let guids: Vec<_> = listed.iter().map(|p| p.guid.as_str()).collect();
        assert_eq!(guids, vec!["RP-HIGH", "RP-LOW"]);
        assert_eq!(listed[0], pattern("RP-HIGH", 0.95));

        // Upsert keeps one row per pattern
        db.track_subscription(TEST_ACCOUNT, &pattern("RP-LOW", 0.9)).unwrap();
        assert_eq!(db.list_tracked_subscriptions(TEST_ACCOUNT).unwrap().len(), 2);
        assert!(db.list_tracked_subscriptions("ACT-2").unwrap().is_empty());
    }

    #[test]
    fn test_cancel_tracked_subscription() {
        let db = Database::in_memory().unwrap();
        db.track_subscription(TEST_ACCOUNT, &pattern("RP-1", 0.9)).unwrap();

        assert!(!db.cancel_tracked_subscription("ACT-2", "RP-1").unwrap());
        assert!(db.cancel_tracked_subscription(TEST_ACCOUNT, "RP-1").unwrap());
        assert!(!db.cancel_tracked_subscription(TEST_ACCOUNT, "RP-1").unwrap());
        assert!(db.list_tracked_subscriptions(TEST_ACCOUNT).unwrap().is_empty());
    }

    #[test]
    fn test_suppressed_subscriptions_per_account() {
        let db = Database::in_memory().unwrap();
        assert!(db.cancelled_subscription_ids(TEST_ACCOUNT).unwrap().is_empty());

        db.suppress_subscription(TEST_ACCOUNT, "RP-1").unwrap();
        db.suppress_subscription(TEST_ACCOUNT, "RP-1").unwrap();
        db.suppress_subscription(TEST_ACCOUNT, "RP-2").unwrap();

        let ids = db.cancelled_subscription_ids(TEST_ACCOUNT).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("RP-1"));
        assert!(db.cancelled_subscription_ids("ACT-2").unwrap().is_empty());
    }

    #[test]
    fn test_encrypted_database_reopens_with_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enc.db");
        let path = path.to_str().unwrap();

        {
            let db = Database::new_with_key(path, Some("correct horse")).unwrap();
            assert!(db.is_encrypted());
            db.upsert_merchant(&sample_merchant("MER-1", "One")).unwrap();
        }

        let db = Database::new_with_key(path, Some("correct horse")).unwrap();
        assert_eq!(db.count_merchants().unwrap(), 1);
        assert!(Database::new_with_key(path, Some("wrong")).is_err());
    }
}
