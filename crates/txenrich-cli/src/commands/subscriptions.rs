//! Subscription command implementations

use anyhow::{bail, Result};
use txenrich_core::Enricher;

use super::{format_amount, truncate};

pub fn cmd_subscriptions_list(enricher: &Enricher, account: &str) -> Result<()> {
    let subscriptions = enricher.list_subscriptions(account);

    if subscriptions.is_empty() {
        println!("No subscriptions tracked for {}.", account);
        println!("💡 Subscriptions appear once a monthly charge has been seen a few times.");
        return Ok(());
    }

    println!("🔁 Subscriptions for {}", account);
    println!();
    println!(
        "{:<20} {:<24} {:>10} {:<10} {:>5} {:<12}",
        "ID", "MERCHANT", "AMOUNT", "FREQUENCY", "CONF", "NEXT"
    );
    println!("{}", "-".repeat(86));

    let mut monthly_total = 0i64;
    for sub in &subscriptions {
        let merchant = sub
            .merchant_guid
            .as_deref()
            .and_then(|guid| enricher.get_merchant(guid).ok().flatten())
            .map(|m| m.name)
            .or_else(|| sub.merchant_guid.clone())
            .unwrap_or_else(|| "-".to_string());
        let next = sub
            .predicted_next_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<20} {:<24} {:>10} {:<10} {:>4.0}% {:<12}",
            truncate(&sub.guid, 20),
            truncate(&merchant, 24),
            format_amount(sub.amount),
            sub.frequency.as_str(),
            sub.confidence * 100.0,
            next
        );
        monthly_total += sub.amount.abs();
    }

    println!();
    println!(
        "Total: {} subscriptions, {}/month",
        subscriptions.len(),
        format_amount(monthly_total)
    );
    Ok(())
}

pub fn cmd_subscriptions_cancel(enricher: &Enricher, account: &str, id: &str) -> Result<()> {
    if !enricher.cancel_subscription(account, id)? {
        bail!("Subscription {} not found for account {}", id, account);
    }
    println!("✅ Cancelled subscription {}", id);
    Ok(())
}
