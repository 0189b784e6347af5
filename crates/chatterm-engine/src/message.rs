//! Message types for chat conversations.
//!
//! A [`ChatMessage`] is one entry of the conversation log. Assistant entries
//! may carry a [`MessageStatus`] while their reply is pending or after the
//! request for it failed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Content shown in a placeholder while its reply is pending.
pub const PLACEHOLDER_CONTENT: &str = "Thinking...";

/// Content shown in a placeholder whose request failed.
pub const FAILED_CONTENT: &str = "Request failed";

/// Role of the author of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message.
    User,
    /// Assistant (model) response.
    Assistant,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Transient state of an assistant message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// The reply for this placeholder is still pending.
    Loading,
    /// The request for this placeholder failed.
    Error,
}

/// Opaque unique message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique id within the conversation.
    pub id: MessageId,
    /// Role of the message author.
    pub role: Role,
    /// Message content.
    pub content: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Pending or failed state; `None` once the content is final.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
    /// Human-readable failure reason (only with [`MessageStatus::Error`]).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

impl ChatMessage {
    fn with_role(role: Role, content: String) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content,
            created_at: Utc::now(),
            status: None,
            error_text: None,
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content.into())
    }

    /// Create a new finalized assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content.into())
    }

    /// Create an assistant placeholder for a pending reply.
    pub fn placeholder() -> Self {
        let mut msg = Self::with_role(Role::Assistant, PLACEHOLDER_CONTENT.to_string());
        msg.status = Some(MessageStatus::Loading);
        msg
    }

    pub fn is_loading(&self) -> bool {
        self.status == Some(MessageStatus::Loading)
    }

    pub fn is_error(&self) -> bool {
        self.status == Some(MessageStatus::Error)
    }

    /// Whether the content is final (neither pending nor failed).
    pub fn is_final(&self) -> bool {
        self.status.is_none()
    }

    /// Replace the content with a reply and drop any transient state.
    pub fn finalize(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.status = None;
        self.error_text = None;
    }

    /// Mark the message as failed with the given reason.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.content = FAILED_CONTENT.to_string();
        self.status = Some(MessageStatus::Error);
        self.error_text = Some(reason.into());
    }

    /// Put a failed message back into the pending state.
    pub fn reset_to_loading(&mut self) {
        self.content = PLACEHOLDER_CONTENT.to_string();
        self.status = Some(MessageStatus::Loading);
        self.error_text = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_creation() {
        let user_msg = ChatMessage::user("Hello");
        assert_eq!(user_msg.role, Role::User);
        assert_eq!(user_msg.content, "Hello");
        assert!(user_msg.is_final());

        let assistant_msg = ChatMessage::assistant("Hi there!");
        assert_eq!(assistant_msg.role, Role::Assistant);
        assert!(assistant_msg.error_text.is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = ChatMessage::user("a");
        let b = ChatMessage::user("a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_placeholder_lifecycle() {
        let mut msg = ChatMessage::placeholder();
        assert!(msg.is_loading());
        assert_eq!(msg.content, PLACEHOLDER_CONTENT);

        msg.fail("timeout");
        assert!(msg.is_error());
        assert_eq!(msg.error_text.as_deref(), Some("timeout"));

        msg.reset_to_loading();
        assert!(msg.is_loading());
        assert!(msg.error_text.is_none());

        msg.finalize("hello");
        assert!(msg.is_final());
        assert_eq!(msg.content, "hello");
    }

    #[test]
    fn test_status_omitted_when_final() {
        let json = serde_json::to_string(&ChatMessage::assistant("done")).unwrap();
        assert!(!json.contains("status"));
        assert!(json.contains("\"role\":\"assistant\""));
    }
}
