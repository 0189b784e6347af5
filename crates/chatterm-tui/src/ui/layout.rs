//! Layout helpers for the chatterm TUI.

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Smallest and largest input box height, borders included.
const INPUT_MIN_HEIGHT: u16 = 3;
const INPUT_MAX_HEIGHT: u16 = 8;

/// Create a centered rect with fixed dimensions.
pub fn centered_fixed(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

/// Create the main layout with status bar at bottom.
pub fn main_layout(area: Rect) -> (Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(area);
    (chunks[0], chunks[1])
}

/// Split the chat area into transcript and an input box sized to its content.
pub fn chat_layout(area: Rect, input_lines: usize) -> (Rect, Rect) {
    let wanted = u16::try_from(input_lines)
        .unwrap_or(u16::MAX)
        .saturating_add(2)
        .clamp(INPUT_MIN_HEIGHT, INPUT_MAX_HEIGHT);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(wanted)])
        .split(area);
    (chunks[0], chunks[1])
}
