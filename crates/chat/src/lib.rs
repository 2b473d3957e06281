#![deny(unsafe_code)]

/// Headless chat engine: paging, scroll anchoring and send reconciliation.
pub mod chat;
/// Connection settings and persisted UI preferences.
pub mod settings;
