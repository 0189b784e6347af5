//! Settings screen - endpoint, API key and request parameters.

use crate::app::{App, SettingsField};
use crate::screens::Screen;
use crate::ui::main_layout;
use crate::ui::theme::{Styles, Symbols};
use crate::ui::widgets::{KeyHint, StatusBar};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

/// Width of the field label column.
const LABEL_WIDTH: usize = 16;

/// The settings screen.
pub struct SettingsScreen;

impl Screen for SettingsScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        let (main_area, status_area) = main_layout(area);

        let block = Block::default()
            .title(" Settings ")
            .title_style(Styles::title())
            .borders(Borders::ALL)
            .border_style(Styles::border_active())
            .style(Styles::default());

        let inner = block.inner(main_area);
        block.render(main_area, buf);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(u16::try_from(SettingsField::ALL.len()).unwrap_or(5) * 2),
                Constraint::Length(3),
                Constraint::Min(0),
            ])
            .split(inner);

        render_fields(app, chunks[1], buf);
        if app.settings_form.editing {
            render_editor(app, chunks[2], buf);
        }
        render_footer(chunks[3], buf);

        let hints = if app.settings_form.editing {
            vec![KeyHint::new("Enter", "Save"), KeyHint::new("Esc", "Cancel")]
        } else {
            vec![
                KeyHint::new("Up/Down", "Select"),
                KeyHint::new("Enter", "Edit"),
                KeyHint::new("Esc", "Back"),
            ]
        };
        let mut status_bar = StatusBar::new("Settings").hints(hints);
        if let Some(notification) = &app.notification {
            status_bar = status_bar.right(notification).right_warning();
        }
        status_bar.render(status_area, buf);
    }
}

fn render_fields(app: &App, area: Rect, buf: &mut Buffer) {
    let form = &app.settings_form;
    let mut lines = Vec::new();

    for (index, field) in SettingsField::ALL.iter().enumerate() {
        let selected = index == form.selected;
        let marker = if selected { Symbols::SELECTED } else { Symbols::UNSELECTED };
        let label_style = if selected { Styles::highlight() } else { Styles::default() };

        let value = field.display_value(&app.settings);
        let value_style = if *field == SettingsField::ApiKey && !app.settings.has_api_key() {
            Styles::warning()
        } else {
            Styles::dim()
        };

        lines.push(Line::from(vec![
            Span::styled(format!(" {marker}"), Styles::highlight()),
            Span::styled(format!("{:<LABEL_WIDTH$}", field.label()), label_style),
            Span::styled(single_line(&value), value_style),
        ]));
        lines.push(Line::from(""));
    }

    Paragraph::new(lines).style(Styles::default()).render(area, buf);
}

fn render_editor(app: &App, area: Rect, buf: &mut Buffer) {
    let field = app.settings_form.selected_field();
    let block = Block::default()
        .title(format!(" Edit {} ", field.label()))
        .title_style(Styles::title())
        .borders(Borders::ALL)
        .border_style(Styles::border_active())
        .style(Styles::default());

    let inner = block.inner(area);
    block.render(area, buf);

    app.settings_form
        .input
        .widget()
        .masked(field == SettingsField::ApiKey)
        .render(inner, buf);
}

fn render_footer(area: Rect, buf: &mut Buffer) {
    let lines = vec![
        Line::from(Span::styled(
            "  Endpoint and API key are saved to the settings file.",
            Styles::dim(),
        )),
        Line::from(Span::styled(
            "  Model, system prompt and temperature apply to this session.",
            Styles::dim(),
        )),
    ];
    Paragraph::new(lines)
        .style(Styles::default())
        .wrap(Wrap { trim: false })
        .render(area, buf);
}

/// First line of a value, with an ellipsis if more follow.
fn single_line(value: &str) -> String {
    match value.split_once('\n') {
        Some((first, _)) => format!("{first}..."),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Action;
    use crate::test_utils::{blank_app, render_app};

    #[test]
    fn test_settings_lists_fields_and_defaults() {
        let mut app = blank_app();
        app.handle_action(Action::Settings);
        let output = render_app(&app);

        for field in SettingsField::ALL {
            assert!(output.contains(field.label()), "missing {}", field.label());
        }
        assert!(output.contains("https://api.openai.com/v1/chat/completions"));
        assert!(output.contains("(not set)"));
        assert!(output.contains("0.7"));
    }

    #[test]
    fn test_api_key_is_masked() {
        let mut app = blank_app();
        app.settings.api_key = "sk-verysecret1234".into();
        app.handle_action(Action::Settings);
        let output = render_app(&app);

        assert!(output.contains("1234"));
        assert!(!output.contains("verysecret"));
    }

    #[test]
    fn test_editor_masks_api_key_input() {
        let mut app = blank_app();
        app.settings.api_key = "sk-verysecret1234".into();
        app.handle_action(Action::Settings);
        app.handle_action(Action::Down);
        app.handle_action(Action::Select);
        let output = render_app(&app);

        assert!(output.contains("Edit API key"));
        assert!(!output.contains("verysecret"));
    }

    #[test]
    fn test_single_line() {
        assert_eq!(single_line("short"), "short");
        assert_eq!(single_line("one\ntwo"), "one...");
    }
}
