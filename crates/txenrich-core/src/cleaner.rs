//! Description cleaning
//!
//! Turns a raw bank description such as `"POS PURCHASE SQ *BLUE BOTTLE 0123456789 OAKLAND CA 94607"`
//! into a readable string plus merchant and location hints for the matcher.
//! Every function here is pure.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::CleaningResult;

/// Two-letter US state and territory codes
const STATE_CODES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN",
    "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH",
    "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "PR", "RI", "SC", "SD", "TN", "TX",
    "UT", "VT", "VA", "WA", "WV", "WI", "WY",
];

/// State codes that double as name words ("BREAD CO", "DINER OH"); only
/// treated as a state when a postal code follows
const AMBIGUOUS_STATE_CODES: &[&str] = &[
    "AL", "CO", "DE", "HI", "ID", "IN", "LA", "MA", "ME", "OH", "OK", "OR", "PA",
];

/// Surface forms seen on statements mapped to canonical merchant names.
///
/// Ordered: the first entry found as whole words in the working string wins,
/// so specific forms precede the generic ones they contain. Every canonical name must map
/// back to itself when cleaned again.
pub const MERCHANT_SURFACE_FORMS: &[(&str, &str)] = &[
    ("AMZN MKTP", "Amazon Marketplace"),
    ("AMAZON MKTPL", "Amazon Marketplace"),
    ("AMAZON MARKETPLACE", "Amazon Marketplace"),
    ("AMZN PRIME", "Amazon Prime"),
    ("AMAZON PRIME", "Amazon Prime"),
    ("PRIME VIDEO", "Prime Video"),
    ("AMZN DIGITAL", "Amazon Digital"),
    ("AMAZON DIGITAL", "Amazon Digital"),
    ("AMZN", "Amazon"),
    ("AMAZON", "Amazon"),
    ("NETFLIX", "Netflix"),
    ("SPOTIFY", "Spotify"),
    ("HULU", "Hulu"),
    ("DISNEY PLUS", "Disney+"),
    ("DISNEYPLUS", "Disney+"),
    ("DISNEY+", "Disney+"),
    ("HBO MAX", "Max"),
    ("YOUTUBE", "YouTube"),
    ("APPLE.COM/BILL", "Apple Services"),
    ("APPLE SERVICES", "Apple Services"),
    ("WM SUPERCENTER", "Walmart"),
    ("WAL-MART", "Walmart"),
    ("WALMART", "Walmart"),
    ("WHOLEFDS", "Whole Foods"),
    ("WHOLE FOODS", "Whole Foods"),
    ("TRADER JOES", "Trader Joe's"),
    ("TRADER JOE", "Trader Joe's"),
    ("KROGER", "Kroger"),
    ("SAFEWAY", "Safeway"),
    ("COSTCO", "Costco"),
    ("TARGET", "Target"),
    ("MCDONALDS", "McDonald's"),
    ("MCDONALD", "McDonald's"),
    ("SBUX", "Starbucks"),
    ("STARBUCKS", "Starbucks"),
    ("DUNKIN", "Dunkin'"),
    ("CHIPOTLE", "Chipotle"),
    ("UBER EATS", "Uber Eats"),
    ("UBER", "Uber"),
    ("LYFT", "Lyft"),
    ("DOORDASH", "DoorDash"),
    ("GRUBHUB", "Grubhub"),
    ("CHEVRON", "Chevron"),
    ("SHELL OIL", "Shell"),
    ("EXXONMOBIL", "ExxonMobil"),
    ("CVS", "CVS Pharmacy"),
    ("WALGREENS", "Walgreens"),
    ("VZWRLSS", "Verizon Wireless"),
    ("VERIZON WIRELESS", "Verizon Wireless"),
    ("COMCAST", "Comcast"),
    ("XFINITY", "Xfinity"),
    ("GEICO", "GEICO"),
    ("PLANET FITNESS", "Planet Fitness"),
    ("PLANET FIT", "Planet Fitness"),
];

static STATE_ZIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b({})\s+\d{{5}}(?:-\d{{4}})?\s*$",
        STATE_CODES.join("|")
    ))
    .expect("state zip regex")
});
static STATE_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\s({})\s*$", STATE_CODES.join("|"))).expect("state end regex")
});
static ZIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{5})(?:-\d{4})?\b").expect("zip regex"));
static LONG_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{10,}").expect("long number regex"));
static MASKED_CARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:X{4,}|\*{4,}|#{2,})[\s-]?\d{4}|\bCARD\s+\d{4}\b").expect("masked card regex")
});
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{4}-\d{2}-\d{2}\b|\b\d{1,2}/\d{1,2}(?:/\d{2,4})?\b").expect("date regex")
});
static SPECIAL_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[*#_~=\-/\\.]{2,}").expect("special run regex"));
static BOILERPLATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:POS DEBIT|POS PURCHASE|POS|DEBIT CARD PURCHASE|DEBIT CARD|CHECKCARD|CHECK CARD|PURCHASE AUTHORIZED ON|PURCHASE|RECURRING PAYMENT|RECURRING|VISA DDA|ACH DEBIT)\b",
    )
    .expect("boilerplate regex")
});
static PROCESSOR_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:SQ\s?\*|TST\s?\*|SP\s?\*|APLPAY\s|APPLEPAY\s|PAYPAL\s?\*)\s*")
        .expect("processor prefix regex")
});
static STORE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\s?\d+|\bSTORE\s+\d+\b").expect("store number regex"));

static FEE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:FEE|FEES|OVERDRAFT|NSF|SERVICE CHARGE|FINANCE CHARGE|LATE CHARGE|MAINTENANCE CHARGE)\b",
    )
    .expect("fee regex")
});
static ATM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bATM\b.*\b(?:WITHDRAWAL|WITHDRAW|W/D|CASH)\b|\b(?:CASH WITHDRAWAL|ATM W/D)\b")
        .expect("atm regex")
});
static TRANSFER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:TRANSFER|XFER|ZELLE|VENMO|CASH APP|WIRE TRANSFER|ONLINE TRANSFER)\b")
        .expect("transfer regex")
});
static CHECK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:CHECK|CHK|DRAFT)\s*(?:NO\.?|#)?\s*\d+\b|\bCHECK\s*#\s*\d+\b")
        .expect("check regex")
});

/// Clean a raw description
pub fn clean(description: &str) -> CleaningResult {
    let upper = description.to_uppercase();
    let upper = upper.trim();
    if upper.is_empty() {
        return CleaningResult::default();
    }

    let location_hints = extract_location_hints(upper);

    let mut working = strip_noise(upper);

    for (surface, canonical) in MERCHANT_SURFACE_FORMS {
        if contains_word(&working, surface) {
            // Canonical names are already display-cased; no title-casing
            return CleaningResult {
                cleaned: (*canonical).to_string(),
                merchant_hints: vec![(*canonical).to_string()],
                location_hints,
            };
        }
    }

    working = strip_trailing_location(&working);
    let cleaned = title_case(&working);

    CleaningResult {
        merchant_hints: fallback_hints(&cleaned),
        cleaned,
        location_hints,
    }
}

/// State codes and postal codes, captured before destructive cleaning
fn extract_location_hints(upper: &str) -> Vec<String> {
    let mut hints = Vec::new();

    if let Some((_, state)) = trailing_state(upper) {
        hints.push(state.to_string());
    }

    // Postal codes are only trusted next to the end of the string, where
    // statements put them; mid-string five-digit runs are usually store ids.
    let tail_start = upper.len().saturating_sub(16);
    for caps in ZIP_RE.captures_iter(upper) {
        let m = caps.get(1).map(|m| (m.start(), m.as_str()));
        if let Some((start, zip)) = m {
            if start >= tail_start && !hints.iter().any(|h| h == zip) {
                hints.push(zip.to_string());
            }
        }
    }

    hints
}

fn strip_noise(upper: &str) -> String {
    let s = LONG_NUMBER_RE.replace_all(upper, " ");
    let s = MASKED_CARD_RE.replace_all(&s, " ");
    let s = DATE_RE.replace_all(&s, " ");
    let s = SPECIAL_RUN_RE.replace_all(&s, " ");
    let s = BOILERPLATE_RE.replace_all(&s, " ");
    let s = collapse_whitespace(&s);
    let s = PROCESSOR_PREFIX_RE.replace(&s, "");
    let s = STORE_NUMBER_RE.replace_all(&s, " ");

    // Reference codes like 2X3Y4Z5W6: long tokens mixing letters and digits
    let tokens: Vec<&str> = s
        .split(|c: char| c.is_whitespace() || c == '*')
        .filter(|t| !t.is_empty())
        .filter(|t| !is_reference_code(t))
        .collect();

    tokens.join(" ")
}

fn is_reference_code(token: &str) -> bool {
    token.len() >= 6
        && token.chars().any(|c| c.is_ascii_digit())
        && token.chars().any(|c| c.is_ascii_alphabetic())
        && token.chars().all(|c| c.is_ascii_alphanumeric())
}

/// `needle` occurs in `haystack` with no letter or digit on either side
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(i, _)| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Byte offset and code of a trailing state, if one can be trusted
fn trailing_state(s: &str) -> Option<(usize, &str)> {
    if let Some(caps) = STATE_ZIP_RE.captures(s) {
        return Some((caps.get(0)?.start(), caps.get(1)?.as_str()));
    }

    let caps = STATE_END_RE.captures(s)?;
    let state = caps.get(1)?.as_str();
    if AMBIGUOUS_STATE_CODES.contains(&state) {
        return None;
    }
    Some((caps.get(0)?.start(), state))
}

/// Drop a trailing "CITY ST 12345" style suffix
///
/// Repeats until nothing more comes off, so cleaning the output again
/// leaves it unchanged.
fn strip_trailing_location(working: &str) -> String {
    let mut current = collapse_whitespace(working);
    loop {
        let without_state = match trailing_state(&current) {
            Some((start, _)) => &current[..start],
            None => current.as_str(),
        };
        let mut tokens: Vec<&str> = without_state.split_whitespace().collect();
        while tokens
            .last()
            .is_some_and(|t| t.chars().all(|c| c.is_ascii_digit()))
        {
            tokens.pop();
        }

        let next = tokens.join(" ");
        if next.is_empty() || next == current {
            return current;
        }
        current = next;
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Title-case a string: first letter of each word upper, rest lower
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    let mut out: String = first.to_uppercase().collect();
                    out.extend(chars.flat_map(|c| c.to_lowercase()));
                    out
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hints when no surface form matched: the whole string, then shorter prefixes
fn fallback_hints(cleaned: &str) -> Vec<String> {
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    let mut hints: Vec<String> = Vec::new();
    let mut push = |hint: String| {
        if !hint.is_empty() && !hints.contains(&hint) {
            hints.push(hint);
        }
    };

    push(cleaned.to_string());
    if words.len() > 2 {
        push(words[..2].join(" "));
    }
    if words.len() > 1 && words[0].len() > 2 {
        push(words[0].to_string());
    }

    hints
}

/// Bank or card fee
pub fn is_fee(description: &str) -> bool {
    FEE_RE.is_match(&description.to_uppercase())
}

/// Cash withdrawal at an ATM
pub fn is_atm_withdrawal(description: &str) -> bool {
    ATM_RE.is_match(&description.to_uppercase())
}

/// Account-to-account or person-to-person transfer
pub fn is_transfer(description: &str) -> bool {
    TRANSFER_RE.is_match(&description.to_uppercase())
}

/// Paper check
pub fn is_check(description: &str) -> bool {
    CHECK_RE.is_match(&description.to_uppercase())
}
