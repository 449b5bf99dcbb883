//! Static category taxonomy
//!
//! A two-level hierarchy of category identifiers. Every prediction the
//! categorizer emits resolves against this table; `CAT-UNCATEGORIZED` is the
//! sentinel for "nothing matched".

use crate::models::CategoryPrediction;

/// Sentinel category for zero-confidence predictions
pub const UNCATEGORIZED: &str = "CAT-UNCATEGORIZED";

/// A taxonomy entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub guid: &'static str,
    pub name: &'static str,
    pub parent_guid: Option<&'static str>,
}

const fn root(guid: &'static str, name: &'static str) -> Category {
    Category {
        guid,
        name,
        parent_guid: None,
    }
}

const fn child(guid: &'static str, name: &'static str, parent: &'static str) -> Category {
    Category {
        guid,
        name,
        parent_guid: Some(parent),
    }
}

pub const CATEGORIES: &[Category] = &[
    root(UNCATEGORIZED, "Uncategorized"),
    // Income
    root("CAT-INCOME", "Income"),
    child("CAT-INCOME-PAYCHECK", "Paycheck", "CAT-INCOME"),
    child("CAT-INCOME-INTEREST", "Interest Income", "CAT-INCOME"),
    child("CAT-INCOME-REFUND", "Refunds", "CAT-INCOME"),
    // Transfers
    root("CAT-TRANSFER", "Transfer"),
    child("CAT-TRANSFER-P2P", "Person to Person", "CAT-TRANSFER"),
    child("CAT-TRANSFER-CREDIT-CARD", "Credit Card Payment", "CAT-TRANSFER"),
    child("CAT-TRANSFER-ATM", "Cash & ATM", "CAT-TRANSFER"),
    // Fees
    root("CAT-FEES", "Fees & Charges"),
    child("CAT-FEES-BANK", "Bank Fee", "CAT-FEES"),
    child("CAT-FEES-ATM", "ATM Fee", "CAT-FEES"),
    child("CAT-FEES-LATE", "Late Fee", "CAT-FEES"),
    child("CAT-FEES-INTEREST", "Finance Charge", "CAT-FEES"),
    // Food
    root("CAT-FOOD", "Food & Dining"),
    child("CAT-FOOD-GROCERIES", "Groceries", "CAT-FOOD"),
    child("CAT-FOOD-RESTAURANTS", "Restaurants", "CAT-FOOD"),
    child("CAT-FOOD-FAST-FOOD", "Fast Food", "CAT-FOOD"),
    child("CAT-FOOD-COFFEE", "Coffee Shops", "CAT-FOOD"),
    child("CAT-FOOD-DELIVERY", "Food Delivery", "CAT-FOOD"),
    // Auto & transport
    root("CAT-AUTO", "Auto & Transport"),
    child("CAT-AUTO-GAS", "Gas & Fuel", "CAT-AUTO"),
    child("CAT-AUTO-RIDESHARE", "Rideshare", "CAT-AUTO"),
    child("CAT-AUTO-PARKING", "Parking", "CAT-AUTO"),
    // Shopping
    root("CAT-SHOPPING", "Shopping"),
    child("CAT-SHOPPING-ONLINE", "Online Shopping", "CAT-SHOPPING"),
    child("CAT-SHOPPING-GENERAL", "General Merchandise", "CAT-SHOPPING"),
    child("CAT-SHOPPING-ELECTRONICS", "Electronics", "CAT-SHOPPING"),
    // Entertainment
    root("CAT-ENTERTAINMENT", "Entertainment"),
    child("CAT-ENTERTAINMENT-STREAMING", "Streaming Services", "CAT-ENTERTAINMENT"),
    child("CAT-ENTERTAINMENT-MUSIC", "Music", "CAT-ENTERTAINMENT"),
    // Health
    root("CAT-HEALTH", "Health & Fitness"),
    child("CAT-HEALTH-PHARMACY", "Pharmacy", "CAT-HEALTH"),
    child("CAT-HEALTH-GYM", "Gym", "CAT-HEALTH"),
    // Travel
    root("CAT-TRAVEL", "Travel"),
    child("CAT-TRAVEL-AIR", "Air Travel", "CAT-TRAVEL"),
    child("CAT-TRAVEL-HOTEL", "Hotel", "CAT-TRAVEL"),
    // Bills
    root("CAT-BILLS", "Bills & Utilities"),
    child("CAT-BILLS-UTILITIES", "Utilities", "CAT-BILLS"),
    child("CAT-BILLS-PHONE", "Mobile Phone", "CAT-BILLS"),
    child("CAT-BILLS-INTERNET", "Internet", "CAT-BILLS"),
    child("CAT-BILLS-INSURANCE", "Insurance", "CAT-BILLS"),
    child("CAT-BILLS-LOAN", "Loan Payment", "CAT-BILLS"),
    child("CAT-BILLS-RENT", "Rent & Mortgage", "CAT-BILLS"),
    // Software
    root("CAT-SOFTWARE", "Software & Services"),
];

/// Look up a taxonomy entry by identifier
pub fn get(guid: &str) -> Option<&'static Category> {
    CATEGORIES.iter().find(|c| c.guid == guid)
}

pub fn contains(guid: &str) -> bool {
    get(guid).is_some()
}

/// Parent entry, if `guid` is a child category
pub fn parent_of(guid: &str) -> Option<&'static Category> {
    get(guid).and_then(|c| c.parent_guid).and_then(get)
}

/// Direct children of a root category
pub fn children_of(guid: &str) -> Vec<&'static Category> {
    CATEGORIES
        .iter()
        .filter(|c| c.parent_guid == Some(guid))
        .collect()
}

/// Resolve a category identifier into a full prediction
///
/// # Panics
///
/// Panics if `guid` is not in the taxonomy. Rule tables and classifier labels
/// are validated against the taxonomy before use, so this only fires on a
/// programming error.
pub fn predict(guid: &str, confidence: f64) -> CategoryPrediction {
    let category = get(guid).unwrap_or_else(|| panic!("category {} missing from taxonomy", guid));
    let parent = category.parent_guid.and_then(get);

    CategoryPrediction {
        category_guid: category.guid.to_string(),
        category_name: category.name.to_string(),
        confidence: confidence.clamp(0.0, 1.0),
        parent_guid: parent.map(|p| p.guid.to_string()),
        parent_name: parent.map(|p| p.name.to_string()),
    }
}

/// The zero-confidence sentinel prediction
pub fn uncategorized() -> CategoryPrediction {
    predict(UNCATEGORIZED, 0.0)
}
