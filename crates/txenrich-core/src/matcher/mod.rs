//! Merchant matching
//!
//! Resolves cleaner hints, a merchant category code and optional coordinates
//! to a known merchant. Strategies run in order and the first success wins:
//!
//! 1. exact normalized name
//! 2. pattern keys derived from the hint
//! 3. category code, upgraded when a nearby location is found
//! 4. fuzzy name similarity against the full name list
//!
//! Index failures are logged and treated as "no match" for that strategy.

mod fuzzy;
mod geo;

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::error::Result;
use crate::models::{MatchStrategy, Merchant, MerchantLocation, MerchantMatchResult};

pub use fuzzy::{levenshtein, similarity};
pub use geo::{haversine_miles, nearest_location};

pub const EXACT_CONFIDENCE: f64 = 0.95;
pub const PATTERN_CONFIDENCE: f64 = 0.88;
pub const CATEGORY_CODE_CONFIDENCE: f64 = 0.70;
pub const CATEGORY_CODE_WITH_LOCATION_CONFIDENCE: f64 = 0.82;
/// Fuzzy confidence is the similarity scaled by this factor
pub const FUZZY_CONFIDENCE_SCALE: f64 = 0.8;
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.75;
pub const LOCATION_RADIUS_MILES: f64 = 10.0;

/// Read access to the merchant index
///
/// Keys passed to `by_name` and `by_pattern` are already normalized with
/// [`normalize_name`].
pub trait MerchantIndex: Send + Sync {
    fn by_name(&self, normalized: &str) -> Result<Option<Merchant>>;
    fn by_pattern(&self, pattern: &str) -> Result<Option<Merchant>>;
    fn by_category_code(&self, code: u32) -> Result<Option<Merchant>>;
    /// Every merchant as `(display name, guid)`
    fn names(&self) -> Result<Vec<(String, String)>>;
    fn by_guid(&self, guid: &str) -> Result<Option<Merchant>>;
}

/// Lowercase, drop everything but letters, digits and spaces, collapse spaces
pub fn normalize_name(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-z0-9][a-z0-9-]*)\.(?:com|net|org|io|tv|co|app)\b").expect("domain regex")
});

const NAME_SUFFIXES: &[&str] = &[
    "inc", "llc", "ltd", "corp", "co", "com", "store", "stores", "online", "us", "usa",
];

/// Pattern keys to try for a hint, most specific first
pub fn pattern_candidates(hint: &str) -> Vec<String> {
    let normalized = normalize_name(hint);
    let mut candidates: Vec<String> = Vec::new();
    let mut push = |c: String| {
        if c.len() >= 3 && !candidates.contains(&c) {
            candidates.push(c);
        }
    };

    push(normalized.clone());

    if let Some(caps) = DOMAIN_RE.captures(&hint.to_lowercase()) {
        push(normalize_name(&caps[1]));
    }

    let mut words: Vec<&str> = normalized.split_whitespace().collect();
    while let Some(last) = words.last() {
        if words.len() > 1
            && (NAME_SUFFIXES.contains(last) || last.chars().all(|c| c.is_ascii_digit()))
        {
            words.pop();
        } else {
            break;
        }
    }
    push(words.join(" "));

    if let Some(first) = normalized.split_whitespace().next() {
        push(first.to_string());
    }

    candidates
}

/// Multi-strategy merchant matcher over a [`MerchantIndex`]
pub struct MerchantMatcher {
    index: Arc<dyn MerchantIndex>,
    /// `(normalized name, guid)` pairs for fuzzy matching
    names: TtlCache<(), Arc<Vec<(String, String)>>>,
    fuzzy_threshold: f64,
}

impl MerchantMatcher {
    pub fn new(index: Arc<dyn MerchantIndex>) -> Self {
        Self::with_settings(index, DEFAULT_FUZZY_THRESHOLD, Duration::from_secs(300))
    }

    pub fn with_settings(
        index: Arc<dyn MerchantIndex>,
        fuzzy_threshold: f64,
        name_cache_ttl: Duration,
    ) -> Self {
        Self {
            index,
            names: TtlCache::new(name_cache_ttl),
            fuzzy_threshold,
        }
    }

    /// Drop the cached name list, e.g. after seeding
    pub fn invalidate_names(&self) {
        self.names.clear();
    }

    /// Resolve hints to a merchant; never fails
    pub fn match_merchant(
        &self,
        hints: &[String],
        category_code: Option<u32>,
        coordinates: Option<(f64, f64)>,
    ) -> MerchantMatchResult {
        let hints: Vec<&str> = hints
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .collect();

        if let Some(merchant) = self.match_exact(&hints) {
            return located(merchant, coordinates, EXACT_CONFIDENCE, MatchStrategy::Exact);
        }

        if let Some(merchant) = self.match_pattern(&hints) {
            return located(merchant, coordinates, PATTERN_CONFIDENCE, MatchStrategy::Pattern);
        }

        if let Some(result) = category_code.and_then(|code| self.match_category_code(code, coordinates)) {
            return result;
        }

        if let Some(result) = hints.first().and_then(|h| self.match_fuzzy(h, coordinates)) {
            return result;
        }

        MerchantMatchResult::no_match()
    }

    fn match_exact(&self, hints: &[&str]) -> Option<Merchant> {
        for hint in hints {
            let key = normalize_name(hint);
            if key.is_empty() {
                continue;
            }
            match self.index.by_name(&key) {
                Ok(Some(merchant)) => {
                    debug!(merchant = %merchant.guid, key = %key, "Exact merchant match");
                    return Some(merchant);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Merchant name lookup failed, skipping exact strategy: {}", e);
                    return None;
                }
            }
        }
        None
    }

    fn match_pattern(&self, hints: &[&str]) -> Option<Merchant> {
        for hint in hints {
            for candidate in pattern_candidates(hint) {
                match self.index.by_pattern(&candidate) {
                    Ok(Some(merchant)) => {
                        debug!(merchant = %merchant.guid, pattern = %candidate, "Pattern merchant match");
                        return Some(merchant);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Merchant pattern lookup failed, skipping pattern strategy: {}", e);
                        return None;
                    }
                }
            }
        }
        None
    }

    fn match_category_code(
        &self,
        code: u32,
        coordinates: Option<(f64, f64)>,
    ) -> Option<MerchantMatchResult> {
        let merchant = match self.index.by_category_code(code) {
            Ok(Some(m)) => m,
            Ok(None) => return None,
            Err(e) => {
                warn!("Category code lookup failed, skipping strategy: {}", e);
                return None;
            }
        };

        let location = coordinates
            .and_then(|point| nearest_location(point, &merchant.locations, LOCATION_RADIUS_MILES))
            .map(|(loc, _)| loc.clone());

        let confidence = if location.is_some() {
            CATEGORY_CODE_WITH_LOCATION_CONFIDENCE
        } else {
            CATEGORY_CODE_CONFIDENCE
        };

        Some(MerchantMatchResult {
            merchant: Some(merchant),
            location,
            confidence,
            matched_by: MatchStrategy::CategoryCode,
        })
    }

    fn match_fuzzy(&self, hint: &str, coordinates: Option<(f64, f64)>) -> Option<MerchantMatchResult> {
        let target = normalize_name(hint);
        if target.is_empty() {
            return None;
        }

        let names = match self.names.get_or_try_insert((), || {
            self.index.names().map(|names| {
                Arc::new(
                    names
                        .into_iter()
                        .map(|(name, guid)| (normalize_name(&name), guid))
                        .collect::<Vec<_>>(),
                )
            })
        }) {
            Ok(names) => names,
            Err(e) => {
                warn!("Merchant name list unavailable, skipping fuzzy strategy: {}", e);
                return None;
            }
        };

        let (best_guid, best_score) = names
            .iter()
            .map(|(name, guid)| (guid, similarity(&target, name)))
            .max_by(|a, b| a.1.total_cmp(&b.1))?;

        if best_score < self.fuzzy_threshold {
            return None;
        }

        let merchant = match self.index.by_guid(best_guid) {
            Ok(Some(m)) => m,
            Ok(None) => return None,
            Err(e) => {
                warn!("Merchant load failed after fuzzy match: {}", e);
                return None;
            }
        };

        debug!(merchant = %merchant.guid, score = best_score, "Fuzzy merchant match");
        Some(located(
            merchant,
            coordinates,
            best_score * FUZZY_CONFIDENCE_SCALE,
            MatchStrategy::Fuzzy,
        ))
    }
}

/// Attach the nearest known location when coordinates are available
fn located(
    merchant: Merchant,
    coordinates: Option<(f64, f64)>,
    confidence: f64,
    matched_by: MatchStrategy,
) -> MerchantMatchResult {
    let location: Option<MerchantLocation> = coordinates
        .and_then(|point| nearest_location(point, &merchant.locations, LOCATION_RADIUS_MILES))
        .map(|(loc, _)| loc.clone());

    MerchantMatchResult {
        merchant: Some(merchant),
        location,
        confidence,
        matched_by,
    }
}
