//! Conversation controller.
//!
//! Owns the ordered message log and the busy flag. A turn is split into
//! [`Conversation::begin_turn`], which appends the user message and a loading
//! placeholder and hands back what to send, and [`Conversation::finish_turn`],
//! which reconciles the outcome into the placeholder. An event loop can run
//! the request in between without holding on to the conversation.

use crate::client::{CompletionError, CompletionRequest, CompletionService};
use crate::config::Settings;
use crate::message::{ChatMessage, MessageId, Role};
use tracing::{debug, info, warn};

/// A turn whose request has not been answered yet.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    /// Id of the assistant placeholder awaiting the reply.
    pub placeholder_id: MessageId,
    /// Prior messages to send, ending with the user message.
    pub history: Vec<ChatMessage>,
}

impl PendingTurn {
    /// Build the request for this turn.
    pub fn request(&self, settings: &Settings) -> CompletionRequest {
        CompletionRequest::new(settings, &self.history)
    }
}

/// Ordered message log with a single in-flight request.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    in_flight: Option<MessageId>,
}

impl Conversation {
    /// Create an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a conversation opened by an assistant greeting.
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::assistant(greeting)],
            in_flight: None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Whether a request is outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether `text` would start a turn right now.
    pub fn can_submit(&self, text: &str) -> bool {
        !self.is_busy() && !text.trim().is_empty()
    }

    /// Start a turn for `text`.
    ///
    /// Returns `None` without touching the log when the text is blank or a
    /// request is already in flight.
    pub fn begin_turn(&mut self, text: &str) -> Option<PendingTurn> {
        if !self.can_submit(text) {
            debug!(busy = self.is_busy(), "submit ignored");
            return None;
        }

        let user = ChatMessage::user(text.trim());
        let mut history = self.sendable_history(self.messages.len());
        history.push(user.clone());

        let placeholder = ChatMessage::placeholder();
        let placeholder_id = placeholder.id.clone();

        self.messages.push(user);
        self.messages.push(placeholder);
        self.in_flight = Some(placeholder_id.clone());

        info!(placeholder = %placeholder_id, history = history.len(), "turn started");
        Some(PendingTurn {
            placeholder_id,
            history,
        })
    }

    /// Reconcile the outcome of a request into its placeholder.
    ///
    /// The busy flag is released when `placeholder_id` is the in-flight turn,
    /// even if the placeholder has since been deleted or the log cleared; in
    /// that case the outcome is dropped.
    pub fn finish_turn(
        &mut self,
        placeholder_id: &MessageId,
        outcome: Result<String, CompletionError>,
    ) {
        if self.in_flight.as_ref() == Some(placeholder_id) {
            self.in_flight = None;
        }

        let Some(msg) = self.messages.iter_mut().find(|m| &m.id == placeholder_id) else {
            debug!(placeholder = %placeholder_id, "placeholder gone, dropping outcome");
            return;
        };
        if !msg.is_loading() {
            return;
        }

        match outcome {
            Ok(reply) => {
                info!(placeholder = %placeholder_id, chars = reply.len(), "turn finished");
                msg.finalize(reply);
            }
            Err(err) => {
                warn!(placeholder = %placeholder_id, error = %err, "turn failed");
                msg.fail(err.to_string());
            }
        }
    }

    /// Re-issue the request for a failed assistant message.
    ///
    /// The message becomes the loading placeholder again and the history is
    /// every message before it. Returns `None` when busy or when `id`
    /// is not a failed assistant message.
    pub fn retry(&mut self, id: &MessageId) -> Option<PendingTurn> {
        if self.is_busy() {
            return None;
        }
        let index = self
            .messages
            .iter()
            .position(|m| &m.id == id && m.role == Role::Assistant && m.is_error())?;

        let history = self.sendable_history(index);
        if !history.iter().any(|m| m.role == Role::User) {
            return None;
        }

        self.messages[index].reset_to_loading();
        self.in_flight = Some(id.clone());

        info!(placeholder = %id, history = history.len(), "turn retried");
        Some(PendingTurn {
            placeholder_id: id.clone(),
            history,
        })
    }

    /// Submit `text` and wait for the reply from `service`.
    ///
    /// Returns `false` if the submission was rejected.
    pub async fn submit<S>(&mut self, text: &str, service: &S, settings: &Settings) -> bool
    where
        S: CompletionService + ?Sized,
    {
        let Some(turn) = self.begin_turn(text) else {
            return false;
        };
        let outcome = service.complete(&turn.request(settings)).await;
        self.finish_turn(&turn.placeholder_id, outcome);
        true
    }

    /// Remove a message by id. Returns whether a message was removed.
    pub fn delete(&mut self, id: &MessageId) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| &m.id != id);
        before != self.messages.len()
    }

    /// Remove every message.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Messages before `end`, failed replies included. Only a loading
    /// placeholder is left out.
    fn sendable_history(&self, end: usize) -> Vec<ChatMessage> {
        self.messages[..end]
            .iter()
            .filter(|m| !m.is_loading())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageStatus;
    use std::sync::Mutex;

    /// Replies with a fixed outcome and records what it was asked.
    struct ScriptedService {
        outcome: Result<String, CompletionError>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedService {
        fn replying(text: &str) -> Self {
            Self {
                outcome: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(err: CompletionError) -> Self {
            Self {
                outcome: Err(err),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl CompletionService for ScriptedService {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
            self.seen.lock().unwrap().push(request.clone());
            self.outcome.clone()
        }
    }

    fn roles_and_content(conv: &Conversation) -> Vec<(Role, String, Option<MessageStatus>)> {
        conv.messages()
            .iter()
            .map(|m| (m.role, m.content.clone(), m.status))
            .collect()
    }

    #[test]
    fn test_blank_submit_is_noop() {
        let mut conv = Conversation::new();
        assert!(conv.begin_turn("").is_none());
        assert!(conv.begin_turn("   \n\t").is_none());
        assert!(conv.is_empty());
        assert!(!conv.is_busy());
    }

    #[test]
    fn test_begin_turn_appends_user_and_placeholder() {
        let mut conv = Conversation::new();
        let turn = conv.begin_turn("  hi  ").unwrap();

        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[0].role, Role::User);
        assert_eq!(conv.messages()[0].content, "hi");
        assert!(conv.messages()[1].is_loading());
        assert_eq!(conv.messages()[1].id, turn.placeholder_id);
        assert!(conv.is_busy());

        // History ends with the user message and excludes the placeholder
        assert_eq!(turn.history.len(), 1);
        assert_eq!(turn.history[0].content, "hi");
    }

    #[test]
    fn test_submit_while_busy_is_noop() {
        let mut conv = Conversation::new();
        conv.begin_turn("first").unwrap();
        assert!(conv.begin_turn("second").is_none());
        assert_eq!(conv.len(), 2);
    }

    #[test]
    fn test_only_one_loading_message() {
        let mut conv = Conversation::new();
        let turn = conv.begin_turn("first").unwrap();
        conv.begin_turn("second");
        assert_eq!(conv.messages().iter().filter(|m| m.is_loading()).count(), 1);

        conv.finish_turn(&turn.placeholder_id, Ok("ok".into()));
        conv.begin_turn("third").unwrap();
        assert_eq!(conv.messages().iter().filter(|m| m.is_loading()).count(), 1);
    }

    #[tokio::test]
    async fn test_successful_turn() {
        let mut conv = Conversation::new();
        let service = ScriptedService::replying("hello");

        assert!(conv.submit("hi", &service, &Settings::default()).await);

        assert_eq!(
            roles_and_content(&conv),
            vec![
                (Role::User, "hi".to_string(), None),
                (Role::Assistant, "hello".to_string(), None),
            ]
        );
        assert!(conv.messages()[1].error_text.is_none());
        assert!(!conv.is_busy());
    }

    #[tokio::test]
    async fn test_failed_turn() {
        let mut conv = Conversation::new();
        let service = ScriptedService::failing(CompletionError::Transport("timeout".into()));

        conv.submit("hi", &service, &Settings::default()).await;

        let reply = &conv.messages()[1];
        assert_eq!(reply.status, Some(MessageStatus::Error));
        assert_eq!(reply.error_text.as_deref(), Some("Network error: timeout"));
        assert!(!conv.is_busy());

        // User may submit again after a failure
        assert!(conv.begin_turn("again").is_some());
    }

    #[tokio::test]
    async fn test_request_carries_history_and_settings() {
        let mut conv = Conversation::with_greeting("Hi, how can I help?");
        let service = ScriptedService::replying("first reply");
        let settings = Settings {
            model: "qwen3".into(),
            system_prompt: "Be brief.".into(),
            endpoint: "http://localhost:8000/v1/chat/completions".into(),
            api_key: "sk-test".into(),
            ..Default::default()
        };

        conv.submit("one", &service, &settings).await;
        conv.submit("two", &service, &settings).await;

        let requests = service.requests();
        assert_eq!(requests.len(), 2);

        let last = &requests[1];
        assert_eq!(last.model, "qwen3");
        assert_eq!(last.endpoint, "http://localhost:8000/v1/chat/completions");
        let contents: Vec<&str> = last.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["Be brief.", "Hi, how can I help?", "one", "first reply", "two"]
        );
        assert!(!contents.contains(&crate::message::PLACEHOLDER_CONTENT));
    }

    #[tokio::test]
    async fn test_failed_replies_stay_in_history() {
        let mut conv = Conversation::new();
        let failing = ScriptedService::failing(CompletionError::Timeout);
        conv.submit("one", &failing, &Settings::default()).await;

        let turn = conv.begin_turn("two").unwrap();
        assert_eq!(turn.history.len(), 3);
        assert!(turn.history[1].is_error());

        let request = turn.request(&Settings::default());
        let wire: Vec<(&str, &str)> = request
            .messages
            .iter()
            .map(|m| (m.role.as_str(), m.content.as_str()))
            .collect();
        assert_eq!(
            wire[1..],
            [
                ("user", "one"),
                ("assistant", crate::message::FAILED_CONTENT),
                ("user", "two"),
            ]
        );
    }

    #[tokio::test]
    async fn test_api_message_becomes_error_text() {
        let mut conv = Conversation::new();
        let service = ScriptedService::failing(CompletionError::Status {
            status: 504,
            message: "timeout".into(),
        });

        conv.submit("hi", &service, &Settings::default()).await;

        assert_eq!(
            roles_and_content(&conv),
            vec![
                (Role::User, "hi".to_string(), None),
                (
                    Role::Assistant,
                    crate::message::FAILED_CONTENT.to_string(),
                    Some(MessageStatus::Error)
                ),
            ]
        );
        assert_eq!(conv.messages()[1].error_text.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_delete_removes_exactly_one() {
        let mut conv = Conversation::new();
        let turn = conv.begin_turn("hi").unwrap();
        conv.finish_turn(&turn.placeholder_id, Ok("hello".into()));
        let user_id = conv.messages()[0].id.clone();

        assert!(conv.delete(&user_id));
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].id, turn.placeholder_id);

        assert!(!conv.delete(&MessageId::new()));
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn test_clear_empties() {
        let mut conv = Conversation::with_greeting("hello");
        let turn = conv.begin_turn("hi").unwrap();
        conv.finish_turn(&turn.placeholder_id, Ok("there".into()));

        conv.clear();
        assert!(conv.is_empty());
    }

    #[test]
    fn test_reply_after_clear_is_dropped_and_busy_released() {
        let mut conv = Conversation::new();
        let turn = conv.begin_turn("hi").unwrap();
        conv.clear();
        assert!(conv.is_busy());

        conv.finish_turn(&turn.placeholder_id, Ok("late".into()));
        assert!(conv.is_empty());
        assert!(!conv.is_busy());
    }

    #[test]
    fn test_reply_after_placeholder_deleted() {
        let mut conv = Conversation::new();
        let turn = conv.begin_turn("hi").unwrap();
        assert!(conv.delete(&turn.placeholder_id));

        conv.finish_turn(&turn.placeholder_id, Ok("late".into()));
        assert_eq!(conv.len(), 1);
        assert!(!conv.is_busy());
    }

    #[test]
    fn test_stale_outcome_does_not_touch_final_message() {
        let mut conv = Conversation::new();
        let turn = conv.begin_turn("hi").unwrap();
        conv.finish_turn(&turn.placeholder_id, Ok("hello".into()));
        conv.finish_turn(&turn.placeholder_id, Err(CompletionError::Timeout));

        assert_eq!(conv.messages()[1].content, "hello");
        assert!(conv.messages()[1].is_final());
    }

    #[tokio::test]
    async fn test_retry_failed_message() {
        let mut conv = Conversation::new();
        let failing = ScriptedService::failing(CompletionError::Timeout);
        conv.submit("hi", &failing, &Settings::default()).await;
        let failed_id = conv.messages()[1].id.clone();

        let turn = conv.retry(&failed_id).unwrap();
        assert!(conv.is_busy());
        assert!(conv.messages()[1].is_loading());
        assert_eq!(turn.history.len(), 1);
        assert_eq!(turn.history[0].content, "hi");

        conv.finish_turn(&turn.placeholder_id, Ok("hello".into()));
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[1].content, "hello");
        assert!(conv.messages()[1].is_final());
    }

    #[test]
    fn test_retry_rejects_non_failed_and_busy() {
        let mut conv = Conversation::new();
        let turn = conv.begin_turn("hi").unwrap();
        let user_id = conv.messages()[0].id.clone();

        // Busy
        assert!(conv.retry(&turn.placeholder_id).is_none());

        conv.finish_turn(&turn.placeholder_id, Ok("hello".into()));
        // Not failed
        assert!(conv.retry(&turn.placeholder_id).is_none());
        // Not an assistant message
        assert!(conv.retry(&user_id).is_none());
    }
}
