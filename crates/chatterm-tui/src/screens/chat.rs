//! Chat screen - transcript, input box and status bar.

use crate::app::{App, Focus};
use crate::screens::Screen;
use crate::ui::theme::{loading_frame, Palette, Styles, Symbols};
use crate::ui::widgets::{KeyHint, StatusBar};
use crate::ui::{chat_layout, main_layout};
use chatterm_engine::{ChatMessage, Role};
use chrono::Local;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

/// Indent for message bodies, matching the selection marker width.
const BODY_INDENT: &str = "  ";

/// The chat screen.
pub struct ChatScreen;

impl Screen for ChatScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        let (main_area, status_area) = main_layout(area);
        let (transcript_area, input_area) = chat_layout(main_area, app.input_state.line_count());

        render_transcript(app, transcript_area, buf);
        render_input(app, input_area, buf);
        render_status_bar(app, status_area, buf);
    }
}

/// Rendered lines of the transcript plus the line span of each message.
struct TranscriptLines {
    lines: Vec<Line<'static>>,
    spans: Vec<(usize, usize)>,
}

fn build_transcript(app: &App, width: usize) -> TranscriptLines {
    let body_width = width.saturating_sub(BODY_INDENT.len()).max(1);
    let transcript_focused = app.focus == Focus::Transcript;

    let mut lines = Vec::new();
    let mut spans = Vec::new();

    for (index, msg) in app.conversation.messages().iter().enumerate() {
        let start = lines.len();
        let selected = transcript_focused && index == app.selected_message;
        let (base, bg) = if selected {
            (Styles::selected(), Palette::SELECTION)
        } else {
            (Styles::default(), Palette::SURFACE)
        };

        lines.push(header_line(msg, selected, bg));

        if msg.is_loading() {
            lines.push(Line::from(vec![
                Span::styled(BODY_INDENT, base),
                Span::styled(
                    format!("{} ", loading_frame(app.tick)),
                    Styles::loading_frame().bg(bg),
                ),
                Span::styled(msg.content.clone(), Styles::message_body(msg.status).bg(bg)),
            ]));
        } else {
            let body_style = if msg.is_error() {
                Styles::message_body(msg.status).bg(bg)
            } else {
                base
            };
            push_wrapped(&mut lines, &msg.content, body_width, body_style, base);

            if let Some(reason) = msg.error_text.as_deref().filter(|_| msg.is_error()) {
                let reason = format!("Reason: {reason}");
                push_wrapped(&mut lines, &reason, body_width, Styles::dim().bg(bg), base);
                if selected {
                    lines.push(Line::from(vec![
                        Span::styled(BODY_INDENT, base),
                        Span::styled("Press r to retry", Styles::warning().bg(bg)),
                    ]));
                }
            }
        }

        spans.push((start, lines.len()));
        lines.push(Line::from(""));
    }

    TranscriptLines { lines, spans }
}

fn header_line(msg: &ChatMessage, selected: bool, bg: Color) -> Line<'static> {
    let marker = if selected { Symbols::SELECTED } else { Symbols::UNSELECTED };
    let label = match msg.role {
        Role::User => "You",
        Role::Assistant => "AI",
    };
    let label_style = Styles::role_label(msg.role).bg(bg);
    let time = msg.created_at.with_timezone(&Local).format("%H:%M").to_string();

    Line::from(vec![
        Span::styled(marker, Styles::highlight().bg(bg)),
        Span::styled(label, label_style),
        Span::styled(format!("  {time}"), Styles::dim().bg(bg)),
    ])
}

fn push_wrapped(
    lines: &mut Vec<Line<'static>>,
    text: &str,
    width: usize,
    style: Style,
    indent_style: Style,
) {
    for raw in text.split('\n') {
        if raw.is_empty() {
            lines.push(Line::from(Span::styled(BODY_INDENT, indent_style)));
            continue;
        }
        for wrapped in textwrap::wrap(raw, width) {
            lines.push(Line::from(vec![
                Span::styled(BODY_INDENT, indent_style),
                Span::styled(wrapped.into_owned(), style),
            ]));
        }
    }
}

/// Scroll offset for a viewport of `height` lines over `total` lines.
pub(crate) fn visible_offset(total: usize, height: usize, requested: usize, follow: bool) -> usize {
    let max = total.saturating_sub(height);
    if follow {
        max
    } else {
        requested.min(max)
    }
}

/// Adjust `offset` so that lines `start..end` are in view.
pub(crate) fn reveal(offset: usize, height: usize, start: usize, end: usize) -> usize {
    if start < offset {
        start
    } else if end > offset + height {
        end.saturating_sub(height).min(start)
    } else {
        offset
    }
}

fn render_transcript(app: &App, area: Rect, buf: &mut Buffer) {
    let focused = app.focus == Focus::Transcript;
    let block = Block::default()
        .title(" Conversation ")
        .title_style(Styles::title())
        .borders(Borders::ALL)
        .border_style(if focused { Styles::border_active() } else { Styles::border() })
        .style(Styles::default());

    let inner = block.inner(area);
    block.render(area, buf);

    if app.conversation.is_empty() {
        let mut hint = vec![
            Line::from(""),
            Line::from(Span::styled("  No messages yet.", Styles::dim())),
            Line::from(Span::styled("  Type below and press Enter to start.", Styles::dim())),
        ];
        if !app.settings.has_api_key() {
            hint.push(Line::from(""));
            hint.push(Line::from(Span::styled(
                "  No API key configured. Press Ctrl+S to open settings.",
                Styles::warning(),
            )));
        }
        Paragraph::new(hint).style(Styles::default()).render(inner, buf);
        app.transcript_max_scroll.set(0);
        return;
    }

    let transcript = build_transcript(app, usize::from(inner.width));
    let height = usize::from(inner.height);
    let total = transcript.lines.len();
    app.transcript_max_scroll.set(total.saturating_sub(height));

    let mut offset = visible_offset(total, height, app.transcript_scroll, app.follow_transcript);
    if focused {
        if let Some(&(start, end)) = transcript.spans.get(app.selected_message) {
            offset = reveal(offset, height, start, end);
        }
    }

    let visible: Vec<Line<'static>> = transcript
        .lines
        .into_iter()
        .skip(offset)
        .take(height)
        .collect();
    Paragraph::new(visible).style(Styles::default()).render(inner, buf);
}

fn render_input(app: &App, area: Rect, buf: &mut Buffer) {
    let focused = app.focus == Focus::Input;
    let busy = app.conversation.is_busy();
    let title = if busy { " Message (Sending...) " } else { " Message " };
    let border_style = Styles::composer_border(busy, focused);
    let block = Block::default()
        .title(title)
        .title_style(if busy { Styles::dim() } else { Styles::title() })
        .borders(Borders::ALL)
        .border_style(border_style)
        .style(Styles::default());

    let inner = block.inner(area);
    block.render(area, buf);

    app.input_state
        .widget()
        .focused(focused)
        .placeholder("Type your message...")
        .render(inner, buf);
}

fn render_status_bar(app: &App, area: Rect, buf: &mut Buffer) {
    let hints = match app.focus {
        Focus::Input => vec![
            KeyHint::new("Enter", "Send"),
            KeyHint::new("Ctrl+J", "Newline"),
            KeyHint::new("Tab", "Messages"),
            KeyHint::new("Ctrl+S", "Settings"),
            KeyHint::new("F1", "Help"),
        ],
        Focus::Transcript => vec![
            KeyHint::new("d", "Delete"),
            KeyHint::new("r", "Retry"),
            KeyHint::new("Tab", "Input"),
            KeyHint::new("Ctrl+L", "Clear"),
        ],
    };

    let mut status_bar = StatusBar::new("Chat").hints(hints);
    if let Some(notification) = &app.notification {
        status_bar = status_bar.right(notification).right_warning();
    } else if !app.settings.has_api_key() {
        status_bar = status_bar.right("No API key").right_warning();
    } else {
        status_bar = status_bar.right(&app.settings.model);
    }
    status_bar.render(area, buf);
}

/// Clear-conversation confirmation overlay.
pub struct ClearConfirmScreen;

impl Screen for ClearConfirmScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        ChatScreen.render(app, area, buf);
        render_clear_confirm_overlay(app, area, buf);
    }
}

fn render_clear_confirm_overlay(app: &App, area: Rect, buf: &mut Buffer) {
    use crate::ui::centered_fixed;
    use ratatui::widgets::Clear;

    let width = 50.min(area.width.saturating_sub(4));
    let height = 8.min(area.height.saturating_sub(2));
    let overlay_area = centered_fixed(width, height, area);

    Clear.render(overlay_area, buf);

    let block = Block::default()
        .title(" Clear Conversation ")
        .title_style(Styles::warning())
        .borders(Borders::ALL)
        .border_style(Styles::border_active())
        .style(Styles::default());

    let inner = block.inner(overlay_area);
    block.render(overlay_area, buf);

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  Delete all {} messages?", app.conversation.len()),
            Styles::default(),
        )),
    ];
    if app.conversation.is_busy() {
        lines.push(Line::from(Span::styled(
            "  The pending reply will be discarded.",
            Styles::dim(),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("  ", Styles::default()),
        Span::styled("[Enter]", Styles::key_hint()),
        Span::styled(" Clear   ", Styles::default()),
        Span::styled("[Esc]", Styles::key_hint()),
        Span::styled(" Cancel", Styles::default()),
    ]));

    Paragraph::new(lines).style(Styles::default()).render(inner, buf);
}
