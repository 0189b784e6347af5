//! Application state and update logic for the chatterm TUI.
//!
//! The app never performs network I/O itself. Turns that need a request are
//! queued and drained by the event loop with [`App::take_pending_turns`];
//! results come back through [`App::finish_turn`].

use crate::event::{key_to_action, Action};
use crate::ui::widgets::TextInputState;
use chatterm_engine::{
    CompletionError, Conversation, MessageId, PendingTurn, Settings, SettingsStore,
};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::cell::Cell;
use tracing::warn;

/// Ticks a notification stays visible (~3 seconds at 4 Hz).
const NOTIFICATION_TICKS: usize = 12;

/// Lines moved by a page scroll.
const PAGE_LINES: usize = 10;

/// The current screen being displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Chat,
    Settings,
    ClearConfirm,
}

/// Which chat pane receives keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Input,
    Transcript,
}

/// Editable settings fields, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    Endpoint,
    ApiKey,
    Model,
    SystemPrompt,
    Temperature,
}

impl SettingsField {
    pub const ALL: [SettingsField; 5] = [
        SettingsField::Endpoint,
        SettingsField::ApiKey,
        SettingsField::Model,
        SettingsField::SystemPrompt,
        SettingsField::Temperature,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SettingsField::Endpoint => "API endpoint",
            SettingsField::ApiKey => "API key",
            SettingsField::Model => "Model",
            SettingsField::SystemPrompt => "System prompt",
            SettingsField::Temperature => "Temperature",
        }
    }

    /// Current value as shown in the form (API key masked).
    pub fn display_value(self, settings: &Settings) -> String {
        match self {
            SettingsField::ApiKey if !settings.has_api_key() => "(not set)".to_string(),
            SettingsField::ApiKey => settings.masked_api_key(),
            other => other.raw_value(settings),
        }
    }

    fn raw_value(self, settings: &Settings) -> String {
        match self {
            SettingsField::Endpoint => settings.endpoint.clone(),
            SettingsField::ApiKey => settings.api_key.clone(),
            SettingsField::Model => settings.model.clone(),
            SettingsField::SystemPrompt => settings.system_prompt.clone(),
            SettingsField::Temperature => format!("{:.1}", settings.temperature),
        }
    }

    /// Whether editing this field writes to the settings store.
    fn is_durable(self) -> bool {
        matches!(self, SettingsField::Endpoint | SettingsField::ApiKey)
    }
}

/// State of the settings form.
#[derive(Debug, Default)]
pub struct SettingsForm {
    /// Index into [`SettingsField::ALL`].
    pub selected: usize,
    /// Whether the selected field is being edited.
    pub editing: bool,
    /// Edit buffer for the selected field.
    pub input: TextInputState,
}

impl SettingsForm {
    pub fn selected_field(&self) -> SettingsField {
        SettingsField::ALL[self.selected.min(SettingsField::ALL.len() - 1)]
    }
}

/// Application state.
#[derive(Debug)]
pub struct App {
    /// Whether the app should quit.
    pub should_quit: bool,

    /// Whether the help overlay is visible.
    pub show_help: bool,

    /// Current screen.
    pub screen: Screen,

    /// Focused chat pane.
    pub focus: Focus,

    /// The conversation being displayed.
    pub conversation: Conversation,

    /// Active settings.
    pub settings: Settings,

    /// Durable store for endpoint and API key; `None` keeps changes in memory.
    store: Option<SettingsStore>,

    /// Chat input box.
    pub input_state: TextInputState,

    /// Selected message index while the transcript is focused.
    pub selected_message: usize,

    /// Requested transcript scroll offset in lines; clamped at render time.
    pub transcript_scroll: usize,

    /// Keep the transcript pinned to the newest line.
    pub follow_transcript: bool,

    /// Largest scroll offset seen by the last render.
    pub transcript_max_scroll: Cell<usize>,

    /// Settings screen state.
    pub settings_form: SettingsForm,

    /// Tick counter for animations.
    pub tick: usize,

    /// Notification message (displayed temporarily, cleared after some ticks).
    pub notification: Option<String>,

    notification_ttl: usize,

    /// Turns waiting to be sent by the event loop.
    pending_turns: Vec<PendingTurn>,
}

impl App {
    /// Create a new app instance.
    pub fn new(settings: Settings, store: Option<SettingsStore>, greeting: Option<&str>) -> Self {
        let conversation = greeting.map_or_else(Conversation::new, Conversation::with_greeting);

        Self {
            should_quit: false,
            show_help: false,
            screen: Screen::Chat,
            focus: Focus::Input,
            conversation,
            settings,
            store,
            input_state: TextInputState::new(),
            selected_message: 0,
            transcript_scroll: 0,
            follow_transcript: true,
            transcript_max_scroll: Cell::new(0),
            settings_form: SettingsForm::default(),
            tick: 0,
            notification: None,
            notification_ttl: 0,
            pending_turns: Vec::new(),
        }
    }

    /// Drain the turns that need a request.
    pub fn take_pending_turns(&mut self) -> Vec<PendingTurn> {
        std::mem::take(&mut self.pending_turns)
    }

    /// Reconcile a finished request.
    pub fn finish_turn(
        &mut self,
        placeholder_id: &MessageId,
        outcome: Result<String, CompletionError>,
    ) {
        self.conversation.finish_turn(placeholder_id, outcome);
        self.follow_transcript = true;
    }

    /// Whether a key press is routed to a text field.
    fn text_entry_active(&self) -> bool {
        if self.show_help {
            return false;
        }
        match self.screen {
            Screen::Chat => self.focus == Focus::Input,
            Screen::Settings => self.settings_form.editing,
            Screen::ClearConfirm => false,
        }
    }

    /// Handle a key press.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        if self.text_entry_active() && self.handle_text_key(key) {
            return;
        }
        self.handle_action(key_to_action(key));
    }

    /// Edit the active text field. Returns true if the key was consumed.
    fn handle_text_key(&mut self, key: KeyEvent) -> bool {
        let in_chat = self.screen == Screen::Chat;

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            // Ctrl+J is how most terminals deliver a newline without submitting
            if in_chat && key.code == KeyCode::Char('j') {
                self.input_state.insert('\n');
                return true;
            }
            return false;
        }

        let input = if in_chat {
            &mut self.input_state
        } else {
            &mut self.settings_form.input
        };

        match key.code {
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) && in_chat => {
                input.insert('\n');
            }
            KeyCode::Enter => {
                if in_chat {
                    self.submit_input();
                } else {
                    self.commit_setting();
                }
            }
            KeyCode::Char(c) => input.insert(c),
            KeyCode::Backspace => input.backspace(),
            KeyCode::Delete => input.delete(),
            KeyCode::Left => input.move_left(),
            KeyCode::Right => input.move_right(),
            KeyCode::Home => input.move_home(),
            KeyCode::End => input.move_end(),
            KeyCode::Up if in_chat && input.line_count() == 1 => input.history_prev(),
            KeyCode::Down if in_chat && input.line_count() == 1 => input.history_next(),
            _ => return false,
        }
        true
    }

    /// Handle an action.
    pub fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => {
                if self.show_help {
                    self.show_help = false;
                } else {
                    self.should_quit = true;
                }
                return;
            }
            Action::Help => {
                self.show_help = !self.show_help;
                return;
            }
            _ => {}
        }

        // If help is showing, any key closes it
        if self.show_help {
            self.show_help = false;
            return;
        }

        match self.screen {
            Screen::Chat => self.handle_chat_action(action),
            Screen::Settings => self.handle_settings_action(action),
            Screen::ClearConfirm => self.handle_clear_confirm_action(action),
        }
    }

    fn handle_chat_action(&mut self, action: Action) {
        match action {
            Action::Settings => {
                self.settings_form = SettingsForm::default();
                self.screen = Screen::Settings;
            }
            Action::Clear => {
                if !self.conversation.is_empty() {
                    self.screen = Screen::ClearConfirm;
                }
            }
            Action::NextFocus => {
                self.focus = match self.focus {
                    Focus::Input => {
                        self.selected_message = self.conversation.len().saturating_sub(1);
                        Focus::Transcript
                    }
                    Focus::Transcript => Focus::Input,
                };
            }
            Action::Back if self.focus == Focus::Transcript => {
                self.focus = Focus::Input;
            }
            Action::Up if self.focus == Focus::Transcript => {
                self.selected_message = self.selected_message.saturating_sub(1);
            }
            Action::Down if self.focus == Focus::Transcript => {
                if self.selected_message + 1 < self.conversation.len() {
                    self.selected_message += 1;
                }
            }
            Action::Up | Action::PageUp => {
                let lines = if action == Action::Up { 1 } else { PAGE_LINES };
                self.scroll_up(lines);
            }
            Action::Down | Action::PageDown => {
                let lines = if action == Action::Down { 1 } else { PAGE_LINES };
                self.scroll_down(lines);
            }
            Action::Delete if self.focus == Focus::Transcript => self.delete_selected(),
            Action::Retry if self.focus == Focus::Transcript => self.retry_selected(),
            _ => {}
        }
    }

    fn scroll_up(&mut self, lines: usize) {
        let max = self.transcript_max_scroll.get();
        let from = if self.follow_transcript {
            max
        } else {
            self.transcript_scroll.min(max)
        };
        self.transcript_scroll = from.saturating_sub(lines);
        self.follow_transcript = false;
    }

    fn scroll_down(&mut self, lines: usize) {
        if self.follow_transcript {
            return;
        }
        let max = self.transcript_max_scroll.get();
        self.transcript_scroll = self.transcript_scroll.saturating_add(lines).min(max);
        if self.transcript_scroll >= max {
            self.follow_transcript = true;
        }
    }

    fn handle_settings_action(&mut self, action: Action) {
        if self.settings_form.editing {
            if action == Action::Back {
                self.settings_form.editing = false;
                self.settings_form.input.clear();
            }
            return;
        }

        match action {
            Action::Back | Action::Settings => {
                self.screen = Screen::Chat;
            }
            Action::Up => {
                self.settings_form.selected = self.settings_form.selected.saturating_sub(1);
            }
            Action::Down => {
                if self.settings_form.selected + 1 < SettingsField::ALL.len() {
                    self.settings_form.selected += 1;
                }
            }
            Action::Select => {
                let field = self.settings_form.selected_field();
                self.settings_form.input =
                    TextInputState::with_content(field.raw_value(&self.settings));
                self.settings_form.editing = true;
            }
            _ => {}
        }
    }

    fn handle_clear_confirm_action(&mut self, action: Action) {
        match action {
            Action::Select => {
                self.conversation.clear();
                self.selected_message = 0;
                self.transcript_scroll = 0;
                self.follow_transcript = true;
                self.focus = Focus::Input;
                self.screen = Screen::Chat;
                self.set_notification("Conversation cleared".to_string());
            }
            Action::Back => {
                self.screen = Screen::Chat;
            }
            _ => {}
        }
    }

    /// Start a turn from the input box.
    pub fn submit_input(&mut self) {
        if self.conversation.is_busy() {
            self.set_notification("Waiting for the current reply...".to_string());
            return;
        }
        if self.input_state.content().trim().is_empty() {
            return;
        }

        let text = self.input_state.submit();
        if let Some(turn) = self.conversation.begin_turn(&text) {
            self.pending_turns.push(turn);
            self.follow_transcript = true;
        }
    }

    fn selected_id(&self) -> Option<MessageId> {
        self.conversation
            .messages()
            .get(self.selected_message)
            .map(|m| m.id.clone())
    }

    fn delete_selected(&mut self) {
        let Some(id) = self.selected_id() else {
            return;
        };
        if self.conversation.delete(&id) {
            let len = self.conversation.len();
            if self.selected_message >= len {
                self.selected_message = len.saturating_sub(1);
            }
            if len == 0 {
                self.focus = Focus::Input;
            }
        }
    }

    fn retry_selected(&mut self) {
        let Some(id) = self.selected_id() else {
            return;
        };
        if let Some(turn) = self.conversation.retry(&id) {
            self.pending_turns.push(turn);
            self.follow_transcript = true;
        } else if self.conversation.is_busy() {
            self.set_notification("Waiting for the current reply...".to_string());
        } else {
            self.set_notification("Only failed replies can be retried".to_string());
        }
    }

    /// Apply the edit buffer to the selected settings field.
    fn commit_setting(&mut self) {
        let field = self.settings_form.selected_field();
        let value = self.settings_form.input.content().to_string();

        let applied = match field {
            SettingsField::Endpoint => {
                self.settings.set_endpoint(&value).map_err(|e| e.to_string())
            }
            SettingsField::ApiKey => {
                self.settings.api_key = value.trim().to_string();
                Ok(())
            }
            SettingsField::Model => {
                let model = value.trim();
                if model.is_empty() {
                    Err("Model cannot be empty".to_string())
                } else {
                    self.settings.model = model.to_string();
                    Ok(())
                }
            }
            SettingsField::SystemPrompt => {
                self.settings.system_prompt = value;
                Ok(())
            }
            SettingsField::Temperature => match value.trim().parse::<f32>() {
                Ok(t) => self.settings.set_temperature(t).map_err(|e| e.to_string()),
                Err(_) => Err(format!("Not a number: {}", value.trim())),
            },
        };

        if let Err(msg) = applied {
            self.set_notification(msg);
            return;
        }

        self.settings_form.editing = false;
        self.settings_form.input.clear();

        if field.is_durable() {
            self.persist_field(field);
        } else {
            self.set_notification(format!("{} updated", field.label()));
        }
    }

    fn persist_field(&mut self, field: SettingsField) {
        let Some(store) = self.store.as_mut() else {
            self.set_notification("Settings updated (not saved)".to_string());
            return;
        };
        let saved = if field == SettingsField::ApiKey {
            self.settings.persist_api_key(store)
        } else {
            self.settings.persist_endpoint(store)
        };
        match saved {
            Ok(()) => self.set_notification("Settings saved".to_string()),
            Err(e) => {
                warn!(error = %e, "failed to persist settings");
                self.set_notification(format!("Failed to save settings: {e}"));
            }
        }
    }

    /// Set a temporary notification message.
    fn set_notification(&mut self, msg: String) {
        self.notification = Some(msg);
        self.notification_ttl = NOTIFICATION_TICKS;
    }

    /// Increment tick counter and update time-based state.
    pub fn tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);

        if self.notification_ttl > 0 {
            self.notification_ttl -= 1;
            if self.notification_ttl == 0 {
                self.notification = None;
            }
        }
    }

    /// Create an app for tests: default settings, no store, no greeting.
    #[cfg(test)]
    pub fn new_for_test() -> Self {
        Self::new(Settings::default(), None, None)
    }
}
