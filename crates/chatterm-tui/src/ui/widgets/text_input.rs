//! Multi-line text input widget.
//!
//! The cursor is a character index, so multi-byte input (CJK, emoji) edits
//! cleanly.

use crate::ui::theme::Styles;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Modifier,
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};

/// A multi-line text input widget.
#[derive(Debug, Clone)]
pub struct TextInput<'a> {
    content: &'a str,
    cursor: usize,
    focused: bool,
    masked: bool,
    placeholder: Option<&'a str>,
    prompt: &'a str,
}

impl<'a> TextInput<'a> {
    /// Set focus state.
    #[must_use]
    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    /// Render every character as `*`.
    #[must_use]
    pub fn masked(mut self, masked: bool) -> Self {
        self.masked = masked;
        self
    }

    /// Set placeholder text.
    #[must_use]
    pub fn placeholder(mut self, placeholder: &'a str) -> Self {
        self.placeholder = Some(placeholder);
        self
    }

    fn lines(&self) -> Vec<Line<'static>> {
        let cursor_style = Styles::active().add_modifier(Modifier::REVERSED);
        let indent = " ".repeat(self.prompt.chars().count());

        let mut lines = Vec::new();
        let mut spans = vec![Span::styled(self.prompt.to_string(), Styles::active())];
        let mut run = String::new();

        for (i, ch) in self.content.chars().enumerate() {
            let at_cursor = self.focused && i == self.cursor;
            if ch == '\n' {
                spans.push(Span::styled(std::mem::take(&mut run), Styles::default()));
                if at_cursor {
                    spans.push(Span::styled(" ", cursor_style));
                }
                lines.push(Line::from(std::mem::take(&mut spans)));
                spans.push(Span::styled(indent.clone(), Styles::default()));
                continue;
            }

            let shown = if self.masked { '*' } else { ch };
            if at_cursor {
                spans.push(Span::styled(std::mem::take(&mut run), Styles::default()));
                spans.push(Span::styled(shown.to_string(), cursor_style));
            } else {
                run.push(shown);
            }
        }

        spans.push(Span::styled(run, Styles::default()));
        if self.focused && self.cursor >= self.content.chars().count() {
            spans.push(Span::styled(" ", cursor_style));
        }
        lines.push(Line::from(spans));
        lines
    }
}

impl Widget for TextInput<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 1 || area.width < 1 {
            return;
        }

        if self.content.is_empty() {
            let mut spans = vec![Span::styled(self.prompt, Styles::active())];
            if self.focused {
                spans.push(Span::styled(
                    " ",
                    Styles::active().add_modifier(Modifier::REVERSED),
                ));
            }
            if let Some(placeholder) = self.placeholder {
                spans.push(Span::styled(placeholder, Styles::dim()));
            }
            Paragraph::new(Line::from(spans))
                .style(Styles::default())
                .render(area, buf);
            return;
        }

        let lines = self.lines();
        // Keep the cursor line in view for long drafts
        let cursor_line = self.content.chars().take(self.cursor).filter(|c| *c == '\n').count();
        let height = usize::from(area.height);
        let skip = (cursor_line + 1).saturating_sub(height);
        let visible: Vec<Line<'_>> = lines.into_iter().skip(skip).collect();

        Paragraph::new(visible)
            .style(Styles::default())
            .wrap(Wrap { trim: false })
            .render(area, buf);
    }
}

/// State for a text input, managing content and cursor position.
#[derive(Debug, Clone, Default)]
pub struct TextInputState {
    content: String,
    /// Cursor position as a character index.
    cursor: usize,
    /// Submitted entries, oldest first.
    history: Vec<String>,
    /// Position while browsing history; `None` means editing the draft.
    history_index: Option<usize>,
    /// Draft saved when history browsing started.
    saved_input: String,
}

impl TextInputState {
    /// Create a new empty text input state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state holding `content` with the cursor at the end.
    pub fn with_content(content: impl Into<String>) -> Self {
        let mut state = Self::new();
        state.set_content(content);
        state
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Number of lines in the content (at least one).
    pub fn line_count(&self) -> usize {
        self.content.split('\n').count()
    }

    /// Replace the content and move the cursor to the end.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.cursor = self.char_len();
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
    }

    /// Take the content, clearing the state.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.content)
    }

    /// Insert a character at the cursor position.
    pub fn insert(&mut self, ch: char) {
        let at = self.byte_index(self.cursor);
        self.content.insert(at, ch);
        self.cursor += 1;
    }

    /// Insert a string at the cursor position.
    pub fn insert_str(&mut self, s: &str) {
        let at = self.byte_index(self.cursor);
        self.content.insert_str(at, s);
        self.cursor += s.chars().count();
    }

    /// Delete the character before the cursor (backspace).
    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_index(self.cursor);
            self.content.remove(at);
        }
    }

    /// Delete the character at the cursor (delete).
    pub fn delete(&mut self) {
        if self.cursor < self.char_len() {
            let at = self.byte_index(self.cursor);
            self.content.remove(at);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.char_len() {
            self.cursor += 1;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.char_len();
    }

    /// Take the content and record it in history if non-blank.
    pub fn submit(&mut self) -> String {
        let content = self.take();
        if !content.trim().is_empty() {
            self.history.push(content.clone());
        }
        self.history_index = None;
        self.saved_input.clear();
        content
    }

    /// Navigate to the previous (older) history entry.
    pub fn history_prev(&mut self) {
        if self.history.is_empty() {
            return;
        }

        let next = match self.history_index {
            None => {
                self.saved_input = self.content.clone();
                0
            }
            Some(i) if i + 1 < self.history.len() => i + 1,
            Some(_) => return,
        };

        self.history_index = Some(next);
        self.set_content(self.history[self.history.len() - 1 - next].clone());
    }

    /// Navigate to the next (newer) history entry, or back to the draft.
    pub fn history_next(&mut self) {
        match self.history_index {
            None => {}
            Some(0) => {
                self.history_index = None;
                let saved = std::mem::take(&mut self.saved_input);
                self.set_content(saved);
            }
            Some(i) => {
                self.history_index = Some(i - 1);
                self.set_content(self.history[self.history.len() - i].clone());
            }
        }
    }

    /// Create a widget from this state.
    pub fn widget(&self) -> TextInput<'_> {
        TextInput {
            content: &self.content,
            cursor: self.cursor,
            focused: true,
            masked: false,
            placeholder: None,
            prompt: "> ",
        }
    }

    fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_index)
            .map_or(self.content.len(), |(i, _)| i)
    }
}
