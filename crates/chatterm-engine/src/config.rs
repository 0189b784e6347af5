//! Settings for the chat client.
//!
//! Endpoint and API key are durable and live in the [`SettingsStore`] under
//! fixed keys. Model, system prompt and temperature only last for a session.

use crate::store::{SettingsStore, StoreError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Store key for the API key.
pub const API_KEY_KEY: &str = "chatterm-api-key";

/// Store key for the endpoint URL.
pub const API_URL_KEY: &str = "chatterm-api-url";

/// Default chat-completions endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Greeting shown at the top of a fresh conversation.
pub const DEFAULT_GREETING: &str = "Hello, I'm your AI assistant. How can I help you?";

/// Client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Full URL of the chat-completions endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bearer token; empty means not configured.
    #[serde(default)]
    pub api_key: String,

    /// Model identifier sent with each request.
    #[serde(default = "default_model")]
    pub model: String,

    /// System prompt prepended to every request.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.into()
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            model: default_model(),
            system_prompt: default_system_prompt(),
            temperature: default_temperature(),
        }
    }
}

impl Settings {
    /// Read durable settings from the store, defaulting the rest.
    pub fn load(store: &SettingsStore) -> Self {
        let mut settings = Self::default();
        if let Some(key) = store.get(API_KEY_KEY) {
            settings.api_key = key.to_string();
        }
        if let Some(url) = store.get(API_URL_KEY).filter(|u| !u.trim().is_empty()) {
            settings.endpoint = url.to_string();
        }
        settings
    }

    /// Write durable settings to the store.
    ///
    /// An empty API key removes the stored key instead of saving it.
    pub fn persist(&self, store: &mut SettingsStore) -> Result<(), SettingsError> {
        self.persist_api_key(store)?;
        self.persist_endpoint(store)
    }

    /// Write only the API key; an empty key removes the stored entry.
    pub fn persist_api_key(&self, store: &mut SettingsStore) -> Result<(), SettingsError> {
        if self.has_api_key() {
            store.set(API_KEY_KEY, self.api_key.clone())?;
        } else {
            store.remove(API_KEY_KEY)?;
        }
        info!(has_key = self.has_api_key(), "api key persisted");
        Ok(())
    }

    /// Write only the endpoint.
    pub fn persist_endpoint(&self, store: &mut SettingsStore) -> Result<(), SettingsError> {
        store.set(API_URL_KEY, self.endpoint.clone())?;
        info!(endpoint = %self.endpoint, "endpoint persisted");
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// API key with everything but the last four characters hidden.
    pub fn masked_api_key(&self) -> String {
        mask_secret(&self.api_key)
    }

    /// Validate and set the temperature (0.0 to 2.0 inclusive).
    pub fn set_temperature(&mut self, value: f32) -> Result<(), SettingsError> {
        if !(0.0..=2.0).contains(&value) {
            return Err(SettingsError::InvalidTemperature(value));
        }
        self.temperature = value;
        Ok(())
    }

    /// Validate and set the endpoint; it must be an http(s) URL.
    pub fn set_endpoint(&mut self, url: &str) -> Result<(), SettingsError> {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SettingsError::InvalidEndpoint(url.to_string()));
        }
        self.endpoint = url.to_string();
        Ok(())
    }
}

/// Hide all but the last four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count == 0 {
        return String::new();
    }
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("{}{tail}", "*".repeat(count - 4))
}

/// Platform config directory for chatterm (e.g. `~/.config/chatterm`).
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chatterm"))
}

/// Errors that can occur when working with settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Error reading or writing the settings store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Temperature outside the accepted range.
    #[error("Temperature must be between 0.0 and 2.0, got {0}")]
    InvalidTemperature(f32),

    /// Endpoint is not an http(s) URL.
    #[error("Endpoint must start with http:// or https://, got {0:?}")]
    InvalidEndpoint(String),
}
