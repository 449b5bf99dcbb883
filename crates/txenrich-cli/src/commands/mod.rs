//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (load_config, open_db, open_enricher)
//! - `enrich` - Offline CSV enrichment
//! - `seed` - Merchant index seeding
//! - `serve` - API server command
//! - `status` - Status and history pruning
//! - `subscriptions` - Tracked subscription commands

pub mod core;
pub mod enrich;
pub mod seed;
pub mod serve;
pub mod status;
pub mod subscriptions;

// Re-export command functions for main.rs
pub use core::*;
pub use enrich::*;
pub use seed::*;
pub use serve::*;
pub use status::*;
pub use subscriptions::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format minor units as dollars, keeping the sign
pub fn format_amount(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}
