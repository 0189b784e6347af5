//! Colors and styles for the chatterm TUI.
//!
//! Chrome (borders, status bar, key hints) shares a small set of styles;
//! transcript styles are keyed by message role and status.

use chatterm_engine::{MessageStatus, Role};
use ratatui::style::{Color, Modifier, Style};

/// Color palette for the TUI.
pub struct Palette;

impl Palette {
    pub const SURFACE: Color = Color::Rgb(28, 30, 38);
    pub const TEXT: Color = Color::Rgb(222, 224, 232);
    pub const MUTED: Color = Color::Rgb(138, 142, 160);

    pub const USER: Color = Color::Rgb(166, 218, 149);
    pub const ASSISTANT: Color = Color::Rgb(138, 173, 244);
    pub const PENDING: Color = Color::Rgb(125, 196, 228);
    pub const FAILED: Color = Color::Rgb(237, 135, 150);
    pub const NOTICE: Color = Color::Rgb(238, 212, 159);

    pub const SELECTION: Color = Color::Rgb(48, 54, 74);
    pub const STATUS_BG: Color = Color::Rgb(42, 44, 58);
    pub const STATUS_KEY_BG: Color = Color::Rgb(73, 92, 140);

    pub const BORDER: Color = Color::Rgb(78, 82, 102);
    pub const BORDER_FOCUS: Color = Self::ASSISTANT;
}

/// Indicator symbols (ASCII only).
pub struct Symbols;

impl Symbols {
    pub const SELECTED: &'static str = "> ";
    pub const UNSELECTED: &'static str = "  ";
    pub const LOADING: [&'static str; 4] = [".  ", ".. ", "...", " .."];
}

/// Loading indicator frame for the given tick.
pub fn loading_frame(tick: usize) -> &'static str {
    Symbols::LOADING[tick % Symbols::LOADING.len()]
}

/// Common styles used throughout the TUI.
pub struct Styles;

impl Styles {
    /// Plain text on the surface color.
    pub fn default() -> Style {
        Style::default().fg(Palette::TEXT).bg(Palette::SURFACE)
    }

    /// Timestamps, hints and other secondary text.
    pub fn dim() -> Style {
        Style::default().fg(Palette::MUTED).bg(Palette::SURFACE)
    }

    pub fn active() -> Style {
        Style::default().fg(Palette::ASSISTANT).bg(Palette::SURFACE)
    }

    pub fn highlight() -> Style {
        Self::active().add_modifier(Modifier::BOLD)
    }

    /// Row background for the selected message.
    pub fn selected() -> Style {
        Style::default().fg(Palette::TEXT).bg(Palette::SELECTION)
    }

    pub fn warning() -> Style {
        Style::default().fg(Palette::NOTICE).bg(Palette::SURFACE)
    }

    pub fn error() -> Style {
        Style::default().fg(Palette::FAILED).bg(Palette::SURFACE)
    }

    pub fn title() -> Style {
        Style::default()
            .fg(Palette::ASSISTANT)
            .add_modifier(Modifier::BOLD)
    }

    /// Bold label for a transcript header.
    pub fn role_label(role: Role) -> Style {
        let color = match role {
            Role::User => Palette::USER,
            Role::Assistant => Palette::ASSISTANT,
        };
        Style::default()
            .fg(color)
            .bg(Palette::SURFACE)
            .add_modifier(Modifier::BOLD)
    }

    /// Body text of a message in the given state.
    pub fn message_body(status: Option<MessageStatus>) -> Style {
        match status {
            None => Self::default(),
            Some(MessageStatus::Loading) => Self::dim().add_modifier(Modifier::ITALIC),
            Some(MessageStatus::Error) => Self::error(),
        }
    }

    /// The animated frame next to a loading placeholder.
    pub fn loading_frame() -> Style {
        Style::default().fg(Palette::PENDING).bg(Palette::SURFACE)
    }

    /// Border of the message composer. Muted while a request is in flight.
    pub fn composer_border(busy: bool, focused: bool) -> Style {
        if busy {
            Self::dim()
        } else if focused {
            Self::border_active()
        } else {
            Self::border()
        }
    }

    /// Key hint (for status bar), bright on dark for visibility.
    pub fn key_hint() -> Style {
        Style::default()
            .fg(Palette::TEXT)
            .bg(Palette::STATUS_KEY_BG)
            .add_modifier(Modifier::BOLD)
    }

    pub fn key_label() -> Style {
        Self::status_bar()
    }

    pub fn status_bar() -> Style {
        Style::default().fg(Palette::TEXT).bg(Palette::STATUS_BG)
    }

    pub fn border() -> Style {
        Style::default().fg(Palette::BORDER)
    }

    pub fn border_active() -> Style {
        Style::default().fg(Palette::BORDER_FOCUS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loading_frame_cycles() {
        assert_eq!(loading_frame(0), ".  ");
        assert_eq!(loading_frame(2), "...");
        assert_eq!(loading_frame(4), loading_frame(0));
    }

    #[test]
    fn test_roles_are_told_apart() {
        assert_eq!(Styles::role_label(Role::User).fg, Some(Palette::USER));
        assert_eq!(
            Styles::role_label(Role::Assistant).fg,
            Some(Palette::ASSISTANT)
        );
    }

    #[test]
    fn test_message_body_follows_status() {
        assert_eq!(Styles::message_body(None), Styles::default());
        assert_eq!(
            Styles::message_body(Some(MessageStatus::Error)).fg,
            Some(Palette::FAILED)
        );
        assert!(Styles::message_body(Some(MessageStatus::Loading))
            .add_modifier
            .contains(Modifier::ITALIC));
    }

    #[test]
    fn test_composer_border_is_muted_while_busy() {
        assert_eq!(Styles::composer_border(true, true), Styles::dim());
        assert_eq!(Styles::composer_border(false, true), Styles::border_active());
        assert_eq!(Styles::composer_border(false, false), Styles::border());
    }
}
