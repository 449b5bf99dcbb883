//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod enrich;
pub mod health;
pub mod merchants;
pub mod subscriptions;

// Re-export all handlers for use in router
pub use enrich::*;
pub use health::*;
pub use merchants::*;
pub use subscriptions::*;
