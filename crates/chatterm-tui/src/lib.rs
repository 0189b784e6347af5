//! chatterm-tui: Terminal UI for the chatterm chat client
//!
//! This crate provides the TUI layer for chatterm, including:
//! - The chat screen with transcript, input box and message actions
//! - The settings screen for endpoint, API key and request parameters
//! - Shared widgets (text input, status bar)

mod app;
mod event;
mod screens;
#[cfg(test)]
pub mod test_utils;
mod ui;

use screens::Screen as ScreenTrait;

pub use app::{App, Focus, Screen};
pub use chatterm_engine;
pub use event::{Action, Event, EventHandler};

use chatterm_engine::config::DEFAULT_GREETING;
use chatterm_engine::{
    CompletionError, CompletionService, MessageId, OpenAiClient, Settings, SettingsStore,
};
use crossterm::{
    cursor::Show as ShowCursor,
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, buffer::Buffer, layout::Rect, Terminal};
use std::io::{self, stdout};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// A finished completion request and the placeholder it fills.
type TurnOutcome = (MessageId, Result<String, CompletionError>);

/// Runs completion requests in background tasks and delivers their outcomes
/// over a channel, so the event loop wakes as soon as a reply lands.
struct TurnRunner {
    tx: mpsc::UnboundedSender<TurnOutcome>,
    rx: mpsc::UnboundedReceiver<TurnOutcome>,
    requests: Vec<AbortHandle>,
}

impl TurnRunner {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            requests: Vec::new(),
        }
    }

    /// Start a request task for every turn the app has queued.
    fn spawn_pending(&mut self, app: &mut App, service: &Arc<dyn CompletionService>) {
        self.requests.retain(|handle| !handle.is_finished());

        for turn in app.take_pending_turns() {
            let request = turn.request(&app.settings);
            let service = Arc::clone(service);
            let id = turn.placeholder_id;
            debug!(
                placeholder = %id,
                history = turn.history.len(),
                "sending completion request"
            );

            let call = tokio::spawn(async move { service.complete(&request).await });
            self.requests.push(call.abort_handle());

            // A panicked or aborted call still reports, so the placeholder
            // never stays loading.
            let tx = self.tx.clone();
            tokio::spawn(async move {
                let outcome = match call.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(error = %e, "completion task did not finish");
                        Err(CompletionError::Transport(e.to_string()))
                    }
                };
                let _ = tx.send((id, outcome));
            });
        }
    }

    /// Wait for the next finished request.
    async fn next_outcome(&mut self) -> Option<TurnOutcome> {
        self.rx.recv().await
    }

    fn abort_all(&mut self) {
        for handle in self.requests.drain(..) {
            handle.abort();
        }
    }
}

/// Hand a request outcome back to the app.
fn reconcile(app: &mut App, (id, outcome): TurnOutcome) {
    if let Err(e) = &outcome {
        warn!(placeholder = %id, error = %e, "completion request failed");
    }
    app.finish_turn(&id, outcome);
}

/// RAII guard for terminal state restoration.
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(stdout(), DisableMouseCapture, LeaveAlternateScreen, ShowCursor);
    }
}

/// Run the TUI application.
///
/// Sets up the terminal, runs the event loop, and restores the terminal on
/// exit. `store` receives endpoint and API key changes made on the settings
/// screen.
pub async fn run_tui(
    settings: Settings,
    store: Option<SettingsStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Setup terminal with RAII guard for cleanup
    enable_raw_mode()?;
    let _guard = TerminalGuard;

    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(settings, store, Some(DEFAULT_GREETING));
    let service: Arc<dyn CompletionService> = Arc::new(OpenAiClient::new());

    // Create event handler (4 Hz tick rate = 250ms)
    let mut events = EventHandler::new(250);

    info!(model = %app.settings.model, "tui started");
    let result = run_loop(&mut terminal, &mut app, &mut events, &service).await;

    // Restore cursor before guard drops
    terminal.show_cursor()?;

    result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    events: &mut EventHandler,
    service: &Arc<dyn CompletionService>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut turns = TurnRunner::new();

    loop {
        terminal.draw(|frame| {
            let area = frame.area();
            draw_app(app, area, frame.buffer_mut());
        })?;

        tokio::select! {
            Some(event) = events.next() => handle_event(app, event),
            Some(outcome) = turns.next_outcome() => reconcile(app, outcome),
            else => break,
        }

        turns.spawn_pending(app, service);

        if app.should_quit {
            turns.abort_all();
            break;
        }
    }

    Ok(())
}

/// Render the current screen and, when open, the help overlay.
fn draw_app(app: &App, area: Rect, buf: &mut Buffer) {
    match app.screen {
        app::Screen::Chat => screens::chat::ChatScreen.render(app, area, buf),
        app::Screen::Settings => screens::settings::SettingsScreen.render(app, area, buf),
        app::Screen::ClearConfirm => screens::chat::ClearConfirmScreen.render(app, area, buf),
    }

    if app.show_help {
        screens::render_help_overlay(area, buf);
    }
}

fn handle_event(app: &mut App, event: Event) {
    match event {
        Event::Key(key) => app.handle_key(key),
        Event::Mouse(mouse) => {
            use crossterm::event::MouseEventKind;
            match mouse.kind {
                MouseEventKind::ScrollUp => app.handle_action(Action::Up),
                MouseEventKind::ScrollDown => app.handle_action(Action::Down),
                _ => {}
            }
        }
        Event::Tick => app.tick(),
        Event::Resize(_, _) => {
            // Terminal will handle resize automatically
        }
    }
}

/// Get the TUI version.
pub fn tui_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatterm_engine::CompletionRequest;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replies with the last user message reversed, or a fixed error.
    struct EchoService {
        fail_with: Option<CompletionError>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl CompletionService for EchoService {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
            self.seen.lock().unwrap().push(request.clone());
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(last.chars().rev().collect())
        }
    }

    fn echo(fail_with: Option<CompletionError>) -> Arc<EchoService> {
        Arc::new(EchoService {
            fail_with,
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Never answers.
    struct SilentService;

    #[async_trait]
    impl CompletionService for SilentService {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, CompletionError> {
            std::future::pending().await
        }
    }

    /// Panics mid-request.
    struct BrokenService;

    #[async_trait]
    impl CompletionService for BrokenService {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, CompletionError> {
            panic!("connection pool poisoned");
        }
    }

    async fn next_within(turns: &mut TurnRunner) -> Option<TurnOutcome> {
        tokio::time::timeout(Duration::from_secs(5), turns.next_outcome())
            .await
            .ok()
            .flatten()
    }

    #[test]
    fn test_tui_version() {
        let version = tui_version();
        assert!(!version.is_empty());
        assert!(version.starts_with("0."));
    }

    #[tokio::test]
    async fn test_turn_round_trip_through_service() {
        let mock = echo(None);
        let service: Arc<dyn CompletionService> = mock.clone();
        let mut app = App::new_for_test();
        let mut turns = TurnRunner::new();

        app.input_state.set_content("abc");
        app.submit_input();
        turns.spawn_pending(&mut app, &service);
        assert_eq!(turns.requests.len(), 1);
        assert!(app.conversation.is_busy());

        let outcome = next_within(&mut turns).await.unwrap();
        reconcile(&mut app, outcome);

        assert!(!app.conversation.is_busy());
        assert_eq!(app.conversation.messages()[1].content, "cba");

        let seen = mock.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, app.settings.model);
    }

    #[tokio::test]
    async fn test_failed_turn_marks_placeholder() {
        let service: Arc<dyn CompletionService> = echo(Some(CompletionError::MissingApiKey));
        let mut app = App::new_for_test();
        let mut turns = TurnRunner::new();

        app.input_state.set_content("hello");
        app.submit_input();
        turns.spawn_pending(&mut app, &service);
        let outcome = next_within(&mut turns).await.unwrap();
        reconcile(&mut app, outcome);

        let reply = &app.conversation.messages()[1];
        assert!(reply.is_error());
        assert_eq!(
            reply.error_text.as_deref(),
            Some("Please configure an API key first.")
        );
        assert!(app.conversation.can_submit("next"));
    }

    #[tokio::test]
    async fn test_reply_wakes_loop_without_input_events() {
        let service: Arc<dyn CompletionService> = echo(None);
        let mut app = App::new_for_test();
        let mut turns = TurnRunner::new();
        // No ticks and no keys: only the reply can wake the select.
        let (_quiet_tx, mut quiet) = mpsc::unbounded_channel::<Event>();

        app.input_state.set_content("ping");
        app.submit_input();
        turns.spawn_pending(&mut app, &service);

        let woke = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::select! {
                Some(event) = quiet.recv() => handle_event(&mut app, event),
                Some(outcome) = turns.next_outcome() => reconcile(&mut app, outcome),
            }
        })
        .await;

        assert!(woke.is_ok());
        assert!(!app.conversation.is_busy());
        assert_eq!(app.conversation.messages()[1].content, "gnip");
    }

    #[tokio::test]
    async fn test_unanswered_turn_stays_loading_until_aborted() {
        let service: Arc<dyn CompletionService> = Arc::new(SilentService);
        let mut app = App::new_for_test();
        let mut turns = TurnRunner::new();

        app.input_state.set_content("hello");
        app.submit_input();
        turns.spawn_pending(&mut app, &service);

        let waited =
            tokio::time::timeout(Duration::from_millis(50), turns.next_outcome()).await;
        assert!(waited.is_err());
        assert!(app.conversation.is_busy());

        turns.abort_all();
        assert!(turns.requests.is_empty());
        let (id, outcome) = next_within(&mut turns).await.unwrap();
        assert_eq!(app.conversation.messages()[1].id, id);
        assert!(matches!(outcome, Err(CompletionError::Transport(_))));
    }

    #[tokio::test]
    async fn test_panicking_service_fails_placeholder() {
        let service: Arc<dyn CompletionService> = Arc::new(BrokenService);
        let mut app = App::new_for_test();
        let mut turns = TurnRunner::new();

        app.input_state.set_content("hello");
        app.submit_input();
        turns.spawn_pending(&mut app, &service);
        let outcome = next_within(&mut turns).await.unwrap();
        reconcile(&mut app, outcome);

        assert!(app.conversation.messages()[1].is_error());
        assert!(!app.conversation.is_busy());
    }
}
