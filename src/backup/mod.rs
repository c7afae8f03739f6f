//! Backup pipeline: mode detection, failure classification, output
//! normalization, and the concurrent per-category dispatcher.

pub mod classify;
pub mod dispatcher;
pub mod mode;
pub mod writer;

pub use dispatcher::Dispatcher;

use crate::models::Context;

/// Capability tag marking firewalls that may expose virtual security
/// contexts. These devices go through mode detection before any
/// configuration fetch; everything else takes the plain path.
pub const CONTEXT_CAPABLE_TAG: &str = "multi-context";

/// Command set for the plain (single-configuration) path.
pub fn plain_commands() -> Vec<String> {
    vec!["show running-config".to_string()]
}

/// Command set for the mode-inquiry probe. Scope is reset to system level
/// first so the probe reads the same regardless of login context.
pub fn mode_inquiry_commands() -> Vec<String> {
    vec!["changeto system".to_string(), "show mode".to_string()]
}

/// Command set listing the virtual security contexts of a device in
/// multiple-context mode.
pub fn context_listing_commands() -> Vec<String> {
    vec!["changeto system".to_string(), "show context".to_string()]
}

/// Command set fetching one discovered context's stored configuration.
/// Session scope is re-established at system level for each fetch.
pub fn context_fetch_commands(context: &Context) -> Vec<String> {
    vec![
        "changeto system".to_string(),
        format!("more {}", context.config_url),
    ]
}
