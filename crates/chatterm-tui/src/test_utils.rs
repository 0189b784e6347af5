//! Helpers for building chat states and reading rendered frames as text.

use crate::app::App;
use chatterm_engine::CompletionError;
use ratatui::{buffer::Buffer, layout::Rect};

/// Default terminal width for tests.
pub const TEST_WIDTH: u16 = 80;

/// Default terminal height for tests.
pub const TEST_HEIGHT: u16 = 24;

/// App with default settings, no API key and an empty conversation.
pub fn blank_app() -> App {
    App::new_for_test()
}

/// App whose conversation has played `exchanges` through the controller:
/// each prompt is submitted and its turn finished with the given outcome.
pub fn app_with_exchanges(exchanges: Vec<(&str, Result<String, CompletionError>)>) -> App {
    let mut app = blank_app();
    app.settings.api_key = "sk-test".into();
    for (prompt, outcome) in exchanges {
        app.input_state.set_content(prompt);
        app.submit_input();
        let turn = app.take_pending_turns().remove(0);
        app.finish_turn(&turn.placeholder_id, outcome);
    }
    app
}

/// Draw the app as the event loop would and return the frame as text.
pub fn render_app(app: &App) -> String {
    let area = Rect::new(0, 0, TEST_WIDTH, TEST_HEIGHT);
    let mut buffer = Buffer::empty(area);
    crate::draw_app(app, area, &mut buffer);
    buffer_to_string(&buffer)
}

/// Convert a buffer to text, one line per row with trailing spaces trimmed.
pub fn buffer_to_string(buffer: &Buffer) -> String {
    let area = buffer.area;
    let rows: Vec<String> = (area.y..area.y + area.height)
        .map(|y| {
            let row: String = (area.x..area.x + area.width)
                .filter_map(|x| buffer.cell((x, y)).map(|cell| cell.symbol()))
                .collect();
            row.trim_end().to_string()
        })
        .collect();
    rows.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Screen;

    #[test]
    fn test_exchanges_leave_app_idle() {
        let app = app_with_exchanges(vec![
            ("first", Ok("one".into())),
            ("second", Err(CompletionError::EmptyReply)),
        ]);
        assert_eq!(app.screen, Screen::Chat);
        assert_eq!(app.conversation.len(), 4);
        assert!(!app.conversation.is_busy());
        assert!(app.conversation.messages()[3].is_error());
    }

    #[test]
    fn test_render_app_follows_current_screen() {
        let mut app = blank_app();
        assert!(render_app(&app).contains("No messages yet."));

        app.screen = Screen::Settings;
        assert!(render_app(&app).contains("Settings"));

        app.show_help = true;
        assert!(render_app(&app).contains("Help"));
    }

    #[test]
    fn test_buffer_to_string() {
        let area = Rect::new(0, 0, 10, 3);
        let mut buffer = Buffer::empty(area);
        buffer.set_string(0, 0, "Hello", ratatui::style::Style::default());
        buffer.set_string(0, 1, "World", ratatui::style::Style::default());

        let result = buffer_to_string(&buffer);
        assert_eq!(result, "Hello\nWorld\n");
    }
}
