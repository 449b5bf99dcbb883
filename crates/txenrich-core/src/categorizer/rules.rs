//! Ordered keyword and category-code rules
//!
//! Keyword rules are checked first, in table order; the first rule whose
//! keyword appears as a whole word sequence in the description or merchant
//! name wins. Category-code ranges are only consulted when no keyword rule
//! fires.

use std::ops::RangeInclusive;

/// Which amount signs a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountSign {
    Any,
    /// Money in (positive amounts)
    Inflow,
    /// Money out (negative amounts)
    Outflow,
}

impl AmountSign {
    fn admits(self, amount: i64) -> bool {
        match self {
            Self::Any => true,
            Self::Inflow => amount > 0,
            Self::Outflow => amount < 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KeywordRule {
    pub category: &'static str,
    pub confidence: f64,
    pub sign: AmountSign,
    /// All of these must be present
    pub requires: &'static [&'static str],
    /// At least one of these must be present
    pub keywords: &'static [&'static str],
}

const fn rule(
    category: &'static str,
    confidence: f64,
    keywords: &'static [&'static str],
) -> KeywordRule {
    KeywordRule {
        category,
        confidence,
        sign: AmountSign::Any,
        requires: &[],
        keywords,
    }
}

const fn signed(
    category: &'static str,
    confidence: f64,
    sign: AmountSign,
    keywords: &'static [&'static str],
) -> KeywordRule {
    KeywordRule {
        category,
        confidence,
        sign,
        requires: &[],
        keywords,
    }
}

pub const KEYWORD_RULES: &[KeywordRule] = &[
    // Fees, most specific first
    KeywordRule {
        category: "CAT-FEES-ATM",
        confidence: 0.95,
        sign: AmountSign::Any,
        requires: &["ATM"],
        keywords: &["FEE", "SURCHARGE"],
    },
    rule("CAT-FEES-LATE", 0.93, &["LATE FEE", "LATE CHARGE", "LATE PAYMENT FEE"]),
    rule("CAT-FEES-INTEREST", 0.93, &["INTEREST CHARGE", "FINANCE CHARGE", "PURCHASE INTEREST"]),
    rule(
        "CAT-FEES-BANK",
        0.95,
        &[
            "OVERDRAFT",
            "NSF",
            "INSUFFICIENT FUNDS",
            "SERVICE CHARGE",
            "MAINTENANCE FEE",
            "WIRE FEE",
            "FOREIGN TRANSACTION FEE",
            "FEE",
        ],
    ),
    // Income
    signed(
        "CAT-INCOME-PAYCHECK",
        0.9,
        AmountSign::Inflow,
        &["PAYROLL", "DIRECT DEP", "DIRECT DEPOSIT", "SALARY", "PAYCHECK"],
    ),
    signed(
        "CAT-INCOME-INTEREST",
        0.9,
        AmountSign::Inflow,
        &["INTEREST PAID", "INTEREST EARNED", "INTEREST PAYMENT", "DIVIDEND"],
    ),
    signed(
        "CAT-INCOME-REFUND",
        0.85,
        AmountSign::Inflow,
        &["REFUND", "RETURN", "REVERSAL", "CASHBACK"],
    ),
    // Transfers
    rule(
        "CAT-TRANSFER-CREDIT-CARD",
        0.88,
        &["AUTOPAY", "CREDIT CARD PAYMENT", "PAYMENT THANK YOU", "CARD PAYMENT"],
    ),
    KeywordRule {
        category: "CAT-TRANSFER-ATM",
        confidence: 0.9,
        sign: AmountSign::Outflow,
        requires: &["ATM"],
        keywords: &["WITHDRAWAL", "WITHDRAW", "CASH"],
    },
    rule("CAT-TRANSFER-ATM", 0.9, &["CASH WITHDRAWAL"]),
    rule("CAT-TRANSFER-P2P", 0.88, &["ZELLE", "VENMO", "CASH APP", "PAYPAL"]),
    rule(
        "CAT-TRANSFER",
        0.85,
        &["TRANSFER", "XFER", "WIRE TRANSFER", "ONLINE TRANSFER"],
    ),
    // Well-known merchants
    rule(
        "CAT-ENTERTAINMENT-STREAMING",
        0.92,
        &[
            "NETFLIX",
            "HULU",
            "DISNEY",
            "HBO",
            "PRIME VIDEO",
            "YOUTUBE",
            "PEACOCK",
            "PARAMOUNT",
        ],
    ),
    rule(
        "CAT-ENTERTAINMENT-MUSIC",
        0.92,
        &["SPOTIFY", "PANDORA", "APPLE MUSIC", "TIDAL", "SIRIUSXM"],
    ),
    rule(
        "CAT-FOOD-DELIVERY",
        0.9,
        &["DOORDASH", "UBER EATS", "GRUBHUB", "POSTMATES", "INSTACART"],
    ),
    rule("CAT-AUTO-RIDESHARE", 0.9, &["UBER", "LYFT"]),
    rule(
        "CAT-FOOD-COFFEE",
        0.92,
        &["STARBUCKS", "DUNKIN", "PEETS", "BLUE BOTTLE", "TIM HORTONS"],
    ),
    rule(
        "CAT-FOOD-FAST-FOOD",
        0.9,
        &[
            "MCDONALD",
            "BURGER KING",
            "WENDY",
            "TACO BELL",
            "CHIPOTLE",
            "SUBWAY",
            "KFC",
            "CHICK FIL A",
            "POPEYES",
            "IN N OUT",
        ],
    ),
    rule(
        "CAT-FOOD-GROCERIES",
        0.9,
        &[
            "WHOLE FOODS",
            "TRADER JOE",
            "KROGER",
            "SAFEWAY",
            "PUBLIX",
            "ALDI",
            "WEGMANS",
            "HEB",
            "GROCERY",
            "SUPERMARKET",
        ],
    ),
    rule(
        "CAT-AUTO-GAS",
        0.88,
        &[
            "SHELL",
            "CHEVRON",
            "EXXON",
            "EXXONMOBIL",
            "MOBIL",
            "BP",
            "ARCO",
            "VALERO",
            "SUNOCO",
            "GAS STATION",
            "FUEL",
        ],
    ),
    rule(
        "CAT-HEALTH-PHARMACY",
        0.9,
        &["CVS", "WALGREENS", "RITE AID", "PHARMACY"],
    ),
    rule(
        "CAT-HEALTH-GYM",
        0.88,
        &["PLANET FITNESS", "EQUINOX", "LA FITNESS", "GYM"],
    ),
    // Bills
    rule(
        "CAT-BILLS-PHONE",
        0.88,
        &["VERIZON WIRELESS", "T MOBILE", "AT T WIRELESS", "MINT MOBILE"],
    ),
    rule(
        "CAT-BILLS-INTERNET",
        0.88,
        &["COMCAST", "XFINITY", "SPECTRUM", "GOOGLE FIBER"],
    ),
    rule(
        "CAT-BILLS-UTILITIES",
        0.88,
        &["ELECTRIC", "UTILITY", "UTILITIES", "WATER DEPT", "PG E", "CON ED"],
    ),
    rule(
        "CAT-BILLS-INSURANCE",
        0.88,
        &["GEICO", "STATE FARM", "PROGRESSIVE", "ALLSTATE", "INSURANCE"],
    ),
    rule("CAT-BILLS-LOAN", 0.88, &["LOAN PAYMENT", "STUDENT LOAN", "AUTO LOAN", "NAVIENT"]),
    rule("CAT-BILLS-RENT", 0.86, &["RENT", "MORTGAGE", "APARTMENTS"]),
    // Travel
    rule(
        "CAT-TRAVEL-AIR",
        0.88,
        &["AIRLINES", "AIRLINE", "DELTA AIR", "SOUTHWEST AIR", "JETBLUE"],
    ),
    rule(
        "CAT-TRAVEL-HOTEL",
        0.88,
        &["HOTEL", "MARRIOTT", "HILTON", "HYATT", "AIRBNB"],
    ),
    rule("CAT-AUTO-PARKING", 0.85, &["PARKING", "PARKMOBILE"]),
    // Shopping
    rule(
        "CAT-SHOPPING-ONLINE",
        0.85,
        &["AMAZON", "AMZN", "EBAY", "ETSY"],
    ),
    rule(
        "CAT-SHOPPING-ELECTRONICS",
        0.85,
        &["BEST BUY", "APPLE STORE", "MICRO CENTER"],
    ),
    rule(
        "CAT-SHOPPING-GENERAL",
        0.85,
        &["WALMART", "TARGET", "COSTCO"],
    ),
    rule(
        "CAT-SOFTWARE",
        0.85,
        &["GITHUB", "OPENAI", "MICROSOFT", "ADOBE", "DROPBOX"],
    ),
    // Generic food words, kept weak so the classifier gets a say
    rule("CAT-FOOD-COFFEE", 0.82, &["COFFEE", "CAFE", "ESPRESSO"]),
    rule("CAT-FOOD-RESTAURANTS", 0.8, &["RESTAURANT", "GRILL", "BISTRO", "DINER"]),
];

/// Merchant category code range mapped to a taxonomy entry
#[derive(Debug, Clone)]
pub struct CodeRule {
    pub category: &'static str,
    pub confidence: f64,
    pub codes: RangeInclusive<u32>,
}

const fn codes(category: &'static str, confidence: f64, codes: RangeInclusive<u32>) -> CodeRule {
    CodeRule {
        category,
        confidence,
        codes,
    }
}

pub const CODE_RULES: &[CodeRule] = &[
    codes("CAT-FOOD-GROCERIES", 0.82, 5411..=5499),
    codes("CAT-FOOD-RESTAURANTS", 0.85, 5812..=5813),
    codes("CAT-FOOD-FAST-FOOD", 0.85, 5814..=5814),
    codes("CAT-AUTO-GAS", 0.85, 5541..=5542),
    codes("CAT-HEALTH-PHARMACY", 0.85, 5912..=5912),
    codes("CAT-TRAVEL-AIR", 0.85, 3000..=3299),
    codes("CAT-TRAVEL-AIR", 0.85, 4511..=4511),
    codes("CAT-TRAVEL-HOTEL", 0.85, 3501..=3999),
    codes("CAT-TRAVEL-HOTEL", 0.85, 7011..=7011),
    codes("CAT-AUTO-RIDESHARE", 0.8, 4121..=4121),
];

/// Uppercase, non-alphanumerics to spaces, padded so `" WORD "` lookups are whole-word
pub fn rule_text(description: &str, merchant_name: Option<&str>) -> String {
    let joined = match merchant_name {
        Some(name) => format!("{} {}", description, name),
        None => description.to_string(),
    };
    let spaced: String = joined
        .to_uppercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    format!(" {} ", spaced.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn has_word(text: &str, keyword: &str) -> bool {
    text.contains(&format!(" {} ", keyword))
}

impl KeywordRule {
    pub fn matches(&self, text: &str, amount: i64) -> bool {
        self.sign.admits(amount)
            && self.requires.iter().all(|k| has_word(text, k))
            && self.keywords.iter().any(|k| has_word(text, k))
    }
}

/// First matching rule as `(category, confidence)`
pub fn evaluate(text: &str, amount: i64, category_code: Option<u32>) -> Option<(&'static str, f64)> {
    if let Some(rule) = KEYWORD_RULES.iter().find(|r| r.matches(text, amount)) {
        return Some((rule.category, rule.confidence));
    }

    let code = category_code?;
    CODE_RULES
        .iter()
        .find(|r| r.codes.contains(&code))
        .map(|r| (r.category, r.confidence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy;

    fn eval(desc: &str, amount: i64, code: Option<u32>) -> Option<(&'static str, f64)> {
        evaluate(&rule_text(desc, None), amount, code)
    }

    #[test]
    fn test_every_rule_targets_taxonomy() {
        for r in KEYWORD_RULES {
            assert!(taxonomy::contains(r.category), "{}", r.category);
            assert!((0.80..=0.95).contains(&r.confidence), "{}", r.category);
        }
        for r in CODE_RULES {
            assert!(taxonomy::contains(r.category), "{}", r.category);
            assert!((0.80..=0.95).contains(&r.confidence), "{}", r.category);
        }
    }

    #[test]
    fn test_rule_text_word_boundaries() {
        let text = rule_text("McDonald's #123", Some("Chick-fil-A"));
        assert_eq!(text, " MCDONALD S 123 CHICK FIL A ");
        assert!(has_word(&text, "MCDONALD"));
        assert!(!has_word(&rule_text("Coffee", None), "FEE"));
    }

    #[test]
    fn test_fee_rules() {
        assert_eq!(eval("Overdraft Fee", -3500, None), Some(("CAT-FEES-BANK", 0.95)));
        assert_eq!(eval("Overdraft Fee", 3500, None), Some(("CAT-FEES-BANK", 0.95)));
        assert_eq!(eval("ATM Fee", -300, None), Some(("CAT-FEES-ATM", 0.95)));
        assert_eq!(eval("Late Fee", -2500, None).unwrap().0, "CAT-FEES-LATE");
    }

    #[test]
    fn test_sign_sensitive_rules() {
        assert_eq!(eval("ACME Corp Payroll", 250000, None).unwrap().0, "CAT-INCOME-PAYCHECK");
        assert_eq!(eval("ACME Corp Payroll", -250000, None), None);
        assert_eq!(eval("ATM Withdrawal Main St", -6000, None).unwrap().0, "CAT-TRANSFER-ATM");
    }

    #[test]
    fn test_merchant_rules() {
        assert_eq!(eval("Netflix", -1599, None).unwrap().0, "CAT-ENTERTAINMENT-STREAMING");
        assert_eq!(eval("Uber Eats", -2400, None).unwrap().0, "CAT-FOOD-DELIVERY");
        assert_eq!(eval("Uber", -1800, None).unwrap().0, "CAT-AUTO-RIDESHARE");
        assert_eq!(eval("Whole Foods", -8000, None).unwrap().0, "CAT-FOOD-GROCERIES");
        assert_eq!(eval("Amazon Marketplace", -4000, None), Some(("CAT-SHOPPING-ONLINE", 0.85)));
    }

    #[test]
    fn test_code_ranges() {
        assert_eq!(eval("Joes", -1000, Some(5411)).unwrap().0, "CAT-FOOD-GROCERIES");
        assert_eq!(eval("Joes", -1000, Some(5812)).unwrap().0, "CAT-FOOD-RESTAURANTS");
        assert_eq!(eval("Joes", -1000, Some(5542)).unwrap().0, "CAT-AUTO-GAS");
        assert_eq!(eval("Joes", -1000, Some(7011)).unwrap().0, "CAT-TRAVEL-HOTEL");
        assert_eq!(eval("Joes", -1000, Some(3058)).unwrap().0, "CAT-TRAVEL-AIR");
        assert_eq!(eval("Joes", -1000, Some(1234)), None);
    }

    #[test]
    fn test_keywords_beat_codes() {
        assert_eq!(eval("Starbucks", -500, Some(5411)).unwrap().0, "CAT-FOOD-COFFEE");
    }
}
