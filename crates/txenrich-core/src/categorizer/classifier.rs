//! Learned category classifier
//!
//! The classifier is a swappable capability behind [`CategoryClassifier`].
//! [`NullClassifier`] stands in when no model is loaded, so callers never
//! special-case a missing model.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::CategoryPrediction;
use crate::taxonomy;

/// Reserved token ids
pub const PAD_ID: usize = 0;
pub const UNKNOWN_ID: usize = 1;

/// Length of [`ClassifierFeatures::numeric`]: amount, 7 weekday slots, hour, has-hour
pub const NUMERIC_FEATURES: usize = 10;

/// Model-independent inputs to a classifier
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierFeatures {
    /// Lowercased word tokens of description and merchant name
    pub tokens: Vec<String>,
    pub numeric: [f64; NUMERIC_FEATURES],
}

impl ClassifierFeatures {
    pub fn new(
        description: &str,
        merchant_name: Option<&str>,
        amount: i64,
        weekday: Weekday,
        hour: Option<u32>,
    ) -> Self {
        let text = match merchant_name {
            Some(name) => format!("{} {}", description, name),
            None => description.to_string(),
        };
        let tokens = tokenize(&text);

        let mut numeric = [0.0; NUMERIC_FEATURES];
        numeric[0] = normalize_amount(amount);
        numeric[1 + weekday.num_days_from_monday() as usize] = 1.0;
        if let Some(h) = hour {
            numeric[8] = f64::from(h.min(23)) / 23.0;
            numeric[9] = 1.0;
        }

        Self { tokens, numeric }
    }
}

/// Split on anything that is not a letter or digit, lowercase
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Signed log scale of the amount in major units, roughly in [-1, 1] for everyday amounts
pub fn normalize_amount(amount_minor: i64) -> f64 {
    let major = amount_minor as f64 / 100.0;
    major.signum() * major.abs().ln_1p() / 10.0
}

/// Anything that maps features to a taxonomy prediction
pub trait CategoryClassifier: Send + Sync {
    /// Always returns an entry from the taxonomy
    fn predict(&self, features: &ClassifierFeatures) -> CategoryPrediction;

    /// Whether a real model backs this classifier
    fn is_loaded(&self) -> bool {
        true
    }

    fn name(&self) -> &str;
}

/// Stand-in when no model is available: always uncategorized at 0.0
#[derive(Debug, Default, Clone, Copy)]
pub struct NullClassifier;

impl CategoryClassifier for NullClassifier {
    fn predict(&self, _features: &ClassifierFeatures) -> CategoryPrediction {
        taxonomy::uncategorized()
    }

    fn is_loaded(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// On-disk model artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    #[serde(default = "default_max_len")]
    pub max_len: usize,
    /// Index is the token id; ids 0 and 1 are padding and unknown
    pub vocabulary: Vec<String>,
    /// Taxonomy identifiers, one per output
    pub labels: Vec<String>,
    /// `[vocabulary][labels]`
    pub token_weights: Vec<Vec<f64>>,
    /// `[NUMERIC_FEATURES][labels]`
    pub numeric_weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

fn default_max_len() -> usize {
    20
}

impl LinearModel {
    fn validate(&self) -> Result<()> {
        let n_labels = self.labels.len();
        if n_labels == 0 {
            return Err(Error::Model("model has no labels".into()));
        }
        if let Some(bad) = self.labels.iter().find(|l| !taxonomy::contains(l)) {
            return Err(Error::Model(format!("label {} is not in the taxonomy", bad)));
        }
        if self.max_len == 0 {
            return Err(Error::Model("max_len must be positive".into()));
        }
        if self.vocabulary.len() < 2 {
            return Err(Error::Model(
                "vocabulary must reserve padding and unknown ids".into(),
            ));
        }
        if self.token_weights.len() != self.vocabulary.len() {
            return Err(Error::Model(format!(
                "token_weights has {} rows, vocabulary has {}",
                self.token_weights.len(),
                self.vocabulary.len()
            )));
        }
        if self.numeric_weights.len() != NUMERIC_FEATURES {
            return Err(Error::Model(format!(
                "numeric_weights must have {} rows",
                NUMERIC_FEATURES
            )));
        }
        let rows_ok = self
            .token_weights
            .iter()
            .chain(self.numeric_weights.iter())
            .all(|row| row.len() == n_labels);
        if !rows_ok || self.bias.len() != n_labels {
            return Err(Error::Model(format!(
                "weight rows and bias must have {} columns",
                n_labels
            )));
        }
        Ok(())
    }
}

/// Softmax-linear classifier over token ids and numeric features
#[derive(Debug, Clone)]
pub struct LinearClassifier {
    model: LinearModel,
    token_ids: HashMap<String, usize>,
}

impl LinearClassifier {
    pub fn from_model(model: LinearModel) -> Result<Self> {
        model.validate()?;
        let token_ids = model
            .vocabulary
            .iter()
            .enumerate()
            .skip(2)
            .map(|(id, token)| (token.clone(), id))
            .collect();
        Ok(Self { model, token_ids })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_model(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Fixed-length id sequence, truncated or padded with [`PAD_ID`]
    pub fn encode(&self, tokens: &[String]) -> Vec<usize> {
        let mut ids: Vec<usize> = tokens
            .iter()
            .take(self.model.max_len)
            .map(|t| self.token_ids.get(t).copied().unwrap_or(UNKNOWN_ID))
            .collect();
        ids.resize(self.model.max_len, PAD_ID);
        ids
    }

    /// Class probabilities in label order
    pub fn probabilities(&self, features: &ClassifierFeatures) -> Vec<f64> {
        let mut logits = self.model.bias.clone();

        for id in self.encode(&features.tokens) {
            if id == PAD_ID {
                continue;
            }
            for (logit, w) in logits.iter_mut().zip(&self.model.token_weights[id]) {
                *logit += w;
            }
        }

        for (value, row) in features.numeric.iter().zip(&self.model.numeric_weights) {
            for (logit, w) in logits.iter_mut().zip(row) {
                *logit += value * w;
            }
        }

        softmax(&logits)
    }
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

impl CategoryClassifier for LinearClassifier {
    fn predict(&self, features: &ClassifierFeatures) -> CategoryPrediction {
        let probs = self.probabilities(features);
        let best = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, p)| (i, *p));

        match best {
            Some((i, p)) if p.is_finite() => taxonomy::predict(&self.model.labels[i], p),
            _ => taxonomy::uncategorized(),
        }
    }

    fn name(&self) -> &str {
        "linear"
    }
}

/// Deterministic classifier for tests: fixed answer, counts invocations
#[derive(Debug)]
pub struct MockClassifier {
    category_guid: &'static str,
    confidence: f64,
    calls: AtomicUsize,
}

impl MockClassifier {
    pub fn new(category_guid: &'static str, confidence: f64) -> Self {
        Self {
            category_guid,
            confidence,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CategoryClassifier for MockClassifier {
    fn predict(&self, _features: &ClassifierFeatures) -> CategoryPrediction {
        self.calls.fetch_add(1, Ordering::SeqCst);
        taxonomy::predict(self.category_guid, self.confidence)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Load the configured model, degrading to [`NullClassifier`] on any failure
pub fn load_classifier(path: Option<&Path>) -> Arc<dyn CategoryClassifier> {
    let Some(path) = path else {
        info!("No classifier model configured, rule tier only");
        return Arc::new(NullClassifier);
    };

    match LinearClassifier::from_file(path) {
        Ok(classifier) => {
            info!(
                path = %path.display(),
                labels = classifier.model.labels.len(),
                "Loaded classifier model"
            );
            Arc::new(classifier)
        }
        Err(e) => {
            warn!(path = %path.display(), "Classifier model unavailable, using rules only: {}", e);
            Arc::new(NullClassifier)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two labels; "latte" pushes toward coffee, "kroger" toward groceries
    fn tiny_model_json() -> String {
        let mut numeric = vec![vec![0.0, 0.0]; NUMERIC_FEATURES];
        numeric[9] = vec![0.5, 0.0];
        serde_json::json!({
            "max_len": 4,
            "vocabulary": ["<pad>", "<unk>", "latte", "kroger"],
            "labels": ["CAT-FOOD-COFFEE", "CAT-FOOD-GROCERIES"],
            "token_weights": [[0.0, 0.0], [0.0, 0.0], [4.0, 0.0], [0.0, 4.0]],
            "numeric_weights": numeric,
            "bias": [0.0, 0.0]
        })
        .to_string()
    }

    fn features(text: &str) -> ClassifierFeatures {
        ClassifierFeatures::new(text, None, -550, Weekday::Tue, None)
    }

    #[test]
    fn test_feature_layout() {
        let f = ClassifierFeatures::new("Oat Latte", Some("Cafe"), -550, Weekday::Wed, Some(23));
        assert_eq!(f.tokens, vec!["oat", "latte", "cafe"]);
        assert!(f.numeric[0] < 0.0);
        assert_eq!(f.numeric[3], 1.0);
        assert_eq!(f.numeric[8], 1.0);
        assert_eq!(f.numeric[9], 1.0);
        assert_eq!(f.numeric[1..8].iter().sum::<f64>(), 1.0);
    }

    #[test]
    fn test_normalize_amount() {
        assert_eq!(normalize_amount(0), 0.0);
        assert_eq!(normalize_amount(1599), -normalize_amount(-1599));
        assert!(normalize_amount(100_000_00) < 1.5);
    }

    #[test]
    fn test_encode_pads_and_truncates() {
        let c = LinearClassifier::from_json(&tiny_model_json()).unwrap();
        let toks = |s: &str| tokenize(s);
        assert_eq!(c.encode(&toks("latte")), vec![2, 0, 0, 0]);
        assert_eq!(c.encode(&toks("mystery latte")), vec![1, 2, 0, 0]);
        assert_eq!(c.encode(&toks("a b c d e latte")).len(), 4);
    }

    #[test]
    fn test_linear_prediction() {
        let c = LinearClassifier::from_json(&tiny_model_json()).unwrap();
        let p = c.predict(&features("large latte"));
        assert_eq!(p.category_guid, "CAT-FOOD-COFFEE");
        assert!(p.confidence > 0.9 && p.confidence <= 1.0);
        assert_eq!(p.parent_guid.as_deref(), Some("CAT-FOOD"));

        let p = c.predict(&features("kroger 123"));
        assert_eq!(p.category_guid, "CAT-FOOD-GROCERIES");

        let probs = c.probabilities(&features("nothing known"));
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_unknown_label() {
        let json = tiny_model_json().replace("CAT-FOOD-GROCERIES", "CAT-NOPE");
        assert!(matches!(LinearClassifier::from_json(&json), Err(Error::Model(_))));
    }

    #[test]
    fn test_rejects_shape_mismatch() {
        let mut model: LinearModel = serde_json::from_str(&tiny_model_json()).unwrap();
        model.bias.push(0.0);
        assert!(LinearClassifier::from_model(model).is_err());
    }

    #[test]
    fn test_null_classifier() {
        let p = NullClassifier.predict(&features("latte"));
        assert_eq!(p.category_guid, taxonomy::UNCATEGORIZED);
        assert_eq!(p.confidence, 0.0);
        assert!(!NullClassifier.is_loaded());
    }

    #[test]
    fn test_load_missing_file_degrades() {
        let c = load_classifier(Some(Path::new("/nonexistent/model.json")));
        assert!(!c.is_loaded());
        assert!(!load_classifier(None).is_loaded());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, tiny_model_json()).unwrap();
        let c = load_classifier(Some(&path));
        assert!(c.is_loaded());
        assert_eq!(c.name(), "linear");
    }

    #[test]
    fn test_mock_counts_calls() {
        let m = MockClassifier::new("CAT-SOFTWARE", 0.6);
        assert_eq!(m.calls(), 0);
        assert_eq!(m.predict(&features("x")).category_guid, "CAT-SOFTWARE");
        assert_eq!(m.calls(), 1);
    }
}
