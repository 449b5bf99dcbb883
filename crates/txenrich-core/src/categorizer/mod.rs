//! Transaction categorization
//!
//! Two tiers: an ordered rule table, then a learned classifier when no rule
//! is confident enough. Results always resolve against the taxonomy.

mod classifier;
mod rules;

use std::sync::Arc;

use chrono::Weekday;
use tracing::debug;

use crate::models::CategoryPrediction;
use crate::taxonomy;

pub use classifier::{
    load_classifier, normalize_amount, tokenize, CategoryClassifier, ClassifierFeatures,
    LinearClassifier, LinearModel, MockClassifier, NullClassifier, NUMERIC_FEATURES,
};
pub use rules::{evaluate as evaluate_rules, rule_text, AmountSign, KeywordRule, CODE_RULES, KEYWORD_RULES};

/// Rule confidence above which the classifier is not consulted
pub const RULE_SHORT_CIRCUIT: f64 = 0.85;

/// Everything the categorizer looks at for one transaction
#[derive(Debug, Clone, Copy)]
pub struct CategorizeInput<'a> {
    pub description: &'a str,
    pub merchant_name: Option<&'a str>,
    pub category_code: Option<u32>,
    /// Minor units, negative = money out
    pub amount: i64,
    pub weekday: Weekday,
    pub hour: Option<u32>,
}

pub struct Categorizer {
    classifier: Arc<dyn CategoryClassifier>,
}

impl Categorizer {
    pub fn new(classifier: Arc<dyn CategoryClassifier>) -> Self {
        Self { classifier }
    }

    /// Rules only
    pub fn rules_only() -> Self {
        Self::new(Arc::new(NullClassifier))
    }

    pub fn classifier(&self) -> &dyn CategoryClassifier {
        self.classifier.as_ref()
    }

    pub fn categorize(&self, input: &CategorizeInput<'_>) -> CategoryPrediction {
        let text = rule_text(input.description, input.merchant_name);
        let rule = evaluate_rules(&text, input.amount, input.category_code)
            .map(|(guid, confidence)| taxonomy::predict(guid, confidence));

        if let Some(ref prediction) = rule {
            if prediction.confidence > RULE_SHORT_CIRCUIT {
                debug!(category = %prediction.category_guid, "Rule tier decided");
                return prediction.clone();
            }
        }

        let features = ClassifierFeatures::new(
            input.description,
            input.merchant_name,
            input.amount,
            input.weekday,
            input.hour,
        );
        let learned = self.classifier.predict(&features);

        match rule {
            Some(rule) if learned.confidence <= rule.confidence => rule,
            Some(_) => {
                debug!(category = %learned.category_guid, "Classifier outscored weak rule");
                learned
            }
            None => learned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(description: &str, amount: i64, code: Option<u32>) -> CategorizeInput<'_> {
        CategorizeInput {
            description,
            merchant_name: None,
            category_code: code,
            amount,
            weekday: Weekday::Mon,
            hour: None,
        }
    }

    #[test]
    fn test_confident_rule_skips_classifier() {
        let mock = Arc::new(MockClassifier::new("CAT-SOFTWARE", 0.99));
        let categorizer = Categorizer::new(mock.clone());
        let p = categorizer.categorize(&input("Overdraft Fee", 3500, None));
        assert_eq!(p.category_guid, "CAT-FEES-BANK");
        assert!(p.confidence >= 0.9);
        assert_eq!(mock.calls(), 0);
    }

    #[test]
    fn test_weak_rule_kept_when_classifier_not_higher() {
        let mock = Arc::new(MockClassifier::new("CAT-SOFTWARE", 0.85));
        let categorizer = Categorizer::new(mock.clone());
        let p = categorizer.categorize(&input("Amazon Marketplace", -4000, None));
        assert_eq!(p.category_guid, "CAT-SHOPPING-ONLINE");
        assert_eq!(mock.calls(), 1);
    }

    #[test]
    fn test_classifier_wins_when_strictly_higher() {
        let mock = Arc::new(MockClassifier::new("CAT-SHOPPING-ELECTRONICS", 0.9));
        let categorizer = Categorizer::new(mock);
        let p = categorizer.categorize(&input("Amazon Marketplace", -4000, None));
        assert_eq!(p.category_guid, "CAT-SHOPPING-ELECTRONICS");
        assert_eq!(p.confidence, 0.9);
    }

    #[test]
    fn test_no_rule_uses_classifier() {
        let mock = Arc::new(MockClassifier::new("CAT-SOFTWARE", 0.4));
        let categorizer = Categorizer::new(mock);
        let p = categorizer.categorize(&input("Zqx Holdings", -1000, None));
        assert_eq!(p.category_guid, "CAT-SOFTWARE");
    }

    #[test]
    fn test_nothing_matches_without_classifier() {
        let p = Categorizer::rules_only().categorize(&input("Zqx Holdings", -1000, Some(1234)));
        assert_eq!(p.category_guid, taxonomy::UNCATEGORIZED);
        assert_eq!(p.confidence, 0.0);
    }

    #[test]
    fn test_merchant_name_participates() {
        let categorizer = Categorizer::rules_only();
        let mut i = input("Sq Bb Sf", -650, None);
        i.merchant_name = Some("Blue Bottle Coffee");
        assert_eq!(categorizer.categorize(&i).category_guid, "CAT-FOOD-COFFEE");
    }

    #[test]
    fn test_always_in_taxonomy() {
        let categorizer = Categorizer::rules_only();
        for desc in ["", "Netflix", "Payroll", "Atm Withdrawal", "Random Words", "Shell"] {
            for amount in [-5000, 0, 5000] {
                let p = categorizer.categorize(&input(desc, amount, Some(5812)));
                assert!(taxonomy::contains(&p.category_guid));
                assert!((0.0..=1.0).contains(&p.confidence));
            }
        }
    }
}
