//! chatterm-engine: Headless engine for the chatterm chat client
//!
//! This crate provides the core logic for chatterm, including:
//! - The conversation controller and its message log
//! - The remote completion service and its OpenAI-compatible client
//! - Settings and the key-value store that persists them

pub mod client;
pub mod config;
pub mod conversation;
pub mod message;
pub mod store;

// Re-export commonly used types
pub use client::{CompletionError, CompletionRequest, CompletionService, OpenAiClient, WireMessage};
pub use config::{default_config_dir, mask_secret, Settings, SettingsError};
pub use conversation::{Conversation, PendingTurn};
pub use message::{ChatMessage, MessageId, MessageStatus, Role};
pub use store::{SettingsStore, StoreError};

/// Returns the engine version.
pub fn engine_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_version() {
        let version = engine_version();
        assert!(!version.is_empty());
        assert!(version.starts_with("0."));
    }
}
