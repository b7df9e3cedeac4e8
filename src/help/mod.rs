use std::borrow::Cow;

use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    style::{Style, Stylize},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::widgets::theme::Theme;

#[derive(Clone)]
pub struct Entry<'a> {
    pub keys: Cow<'a, str>,
    pub short: Cow<'a, str>,
}

impl Entry<'static> {
    pub const fn new(keys: &'static str, short: &'static str) -> Self {
        Self {
            keys: Cow::Borrowed(keys),
            short: Cow::Borrowed(short),
        }
    }
}

fn make_spans<'a>(entries: &'a [Entry<'a>], theme: &Theme) -> Vec<Span<'a>> {
    let mut spans: Vec<_> = entries
        .iter()
        .filter(|entry| !entry.keys.is_empty())
        .flat_map(|entry| {
            [
                Span::styled(format!("[{}]", entry.keys), Style::default().bold()),
                Span::raw(" "),
                Span::raw(entry.short.as_ref()),
                Span::styled(" • ", Style::default().fg(theme.text_muted())),
            ]
        })
        .collect();
    // Remove the trailing separator
    spans.pop();
    spans
}

pub fn height(entries: &[Entry<'_>], area: Rect, theme: &Theme) -> u16 {
    let total_width: usize = make_spans(entries, theme)
        .iter()
        .map(|s| s.content.width())
        .sum();
    let available_width = (area.width as usize).max(1);

    // number of rows needed = ceil(total_width / available_width)
    total_width.div_ceil(available_width) as u16
}

pub fn render(entries: &[Entry<'_>], frame: &mut Frame, area: Rect, theme: &Theme) {
    let spans = make_spans(entries, theme);
    let footer = Paragraph::new(Line::from(spans))
        .style(Style::default().fg(theme.text()))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    frame.render_widget(footer, area);
}
