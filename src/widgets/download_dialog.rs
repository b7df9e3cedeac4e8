use std::{
    cell::{Cell, RefCell},
    time::Instant,
};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Margin, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Paragraph, Wrap},
};
use vlogs_export::download::{DownloadController, FILE_EXTENSION};

use crate::{
    help,
    util::{fill_bg, pad},
    widgets::{Popup, theme::Theme},
};

/// What the owner of the dialog should do after a key press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DialogAction {
    None,
    Close,
    Download,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Focus {
    Filename,
    Download,
    Cancel,
}

struct FormInput {
    value: String,
    cursor: usize,
}

impl FormInput {
    fn new(value: String) -> Self {
        let cursor = value.chars().count();
        Self { value, cursor }
    }

    fn value(&self) -> &str {
        &self.value
    }

    fn handle_key(&mut self, key: &KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('a') if ctrl => {
                self.cursor = 0;
                true
            }
            KeyCode::Char('e') if ctrl => {
                self.cursor = self.value.chars().count();
                true
            }
            KeyCode::Char('u') if ctrl => {
                let idx = char_to_byte_idx(&self.value, self.cursor);
                self.value.replace_range(..idx, "");
                self.cursor = 0;
                true
            }
            KeyCode::Char(_) if ctrl => false,
            KeyCode::Char(c) => {
                let idx = char_to_byte_idx(&self.value, self.cursor);
                self.value.insert(idx, c);
                self.cursor += 1;
                true
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    let start = char_to_byte_idx(&self.value, self.cursor - 1);
                    let end = char_to_byte_idx(&self.value, self.cursor);
                    self.value.replace_range(start..end, "");
                    self.cursor -= 1;
                }
                true
            }
            KeyCode::Delete => {
                let len = self.value.chars().count();
                if self.cursor < len {
                    let start = char_to_byte_idx(&self.value, self.cursor);
                    let end = char_to_byte_idx(&self.value, self.cursor + 1);
                    self.value.replace_range(start..end, "");
                }
                true
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                true
            }
            KeyCode::Right => {
                let len = self.value.chars().count();
                if self.cursor < len {
                    self.cursor += 1;
                }
                true
            }
            KeyCode::Home => {
                self.cursor = 0;
                true
            }
            KeyCode::End => {
                self.cursor = self.value.chars().count();
                true
            }
            _ => false,
        }
    }

    fn visible_text(&self, width: usize) -> (String, usize) {
        if width == 0 {
            return (String::new(), 0);
        }
        let len = self.value.chars().count();
        let cursor = self.cursor.min(len);
        let start = if cursor >= width {
            cursor + 1 - width
        } else {
            0
        };
        let text: String = self.value.chars().skip(start).take(width).collect();
        let cursor_pos = cursor.saturating_sub(start).min(width.saturating_sub(1));
        (text, cursor_pos)
    }
}

fn char_to_byte_idx(value: &str, char_idx: usize) -> usize {
    value
        .char_indices()
        .nth(char_idx)
        .map(|(idx, _)| idx)
        .unwrap_or(value.len())
}

/// Dialog bound to a [`DownloadController`]. The controller lives as long as
/// the dialog, so the draft and the last error survive closing it.
pub(crate) struct DownloadDialog {
    controller: RefCell<DownloadController>,
    input: RefCell<FormInput>,
    focus: Cell<Focus>,
    description: RefCell<String>,
    in_flight_since: Cell<Option<Instant>>,
    help_entries: Vec<help::Entry<'static>>,
}

impl DownloadDialog {
    const TITLE: &'static str = "Download logs";
    const DESCRIPTION_HEIGHT: u16 = 4;
    const ALERT_HEIGHT: u16 = 2;
    const SPINNER_FRAME_MS: u128 = 100;

    pub(crate) fn new() -> Self {
        let controller = DownloadController::new();
        let input = FormInput::new(controller.filename().to_string());
        Self {
            controller: RefCell::new(controller),
            input: RefCell::new(input),
            focus: Cell::new(Focus::Filename),
            description: RefCell::new(String::new()),
            in_flight_since: Cell::new(None),
            help_entries: vec![
                help::Entry::new("tab/shift+tab", "move"),
                help::Entry::new("⏎", "download"),
                help::Entry::new("esc", "close"),
            ],
        }
    }

    pub(crate) fn controller(&self) -> &RefCell<DownloadController> {
        &self.controller
    }

    pub(crate) fn set_summary(&self, period: &str, tenant: &str) {
        self.description.replace(format!(
            "This will download all logs for {period} using your current query for tenant {tenant}."
        ));
    }

    fn is_in_flight(&self) -> bool {
        self.controller.borrow().state().is_in_flight()
    }

    fn next_focus(&self) {
        let next = match self.focus.get() {
            Focus::Filename => Focus::Download,
            Focus::Download => Focus::Cancel,
            Focus::Cancel => Focus::Filename,
        };
        self.focus.set(next);
    }

    fn prev_focus(&self) {
        let prev = match self.focus.get() {
            Focus::Filename => Focus::Cancel,
            Focus::Download => Focus::Filename,
            Focus::Cancel => Focus::Download,
        };
        self.focus.set(prev);
    }

    fn download_action(&self) -> DialogAction {
        if self.is_in_flight() {
            DialogAction::None
        } else {
            DialogAction::Download
        }
    }

    pub(crate) fn handle_key(&self, key: &KeyEvent) -> DialogAction {
        match key.code {
            KeyCode::Esc => return DialogAction::Close,
            KeyCode::Tab | KeyCode::Down => {
                self.next_focus();
                return DialogAction::None;
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.prev_focus();
                return DialogAction::None;
            }
            _ => {}
        }

        match self.focus.get() {
            Focus::Filename => {
                if key.code == KeyCode::Enter {
                    return self.download_action();
                }
                let mut input = self.input.borrow_mut();
                if input.handle_key(key) {
                    self.controller.borrow_mut().set_filename(input.value());
                }
                DialogAction::None
            }
            Focus::Download | Focus::Cancel => match key.code {
                KeyCode::Left | KeyCode::Right => {
                    let next = if self.focus.get() == Focus::Download {
                        Focus::Cancel
                    } else {
                        Focus::Download
                    };
                    self.focus.set(next);
                    DialogAction::None
                }
                KeyCode::Enter if self.focus.get() == Focus::Download => self.download_action(),
                KeyCode::Enter => DialogAction::Close,
                _ => DialogAction::None,
            },
        }
    }

    fn spinner_frame(&self) -> &'static str {
        let symbols = throbber_widgets_tui::BRAILLE_SIX.symbols;
        let started = match self.in_flight_since.get() {
            Some(started) => started,
            None => {
                let now = Instant::now();
                self.in_flight_since.set(Some(now));
                now
            }
        };
        let frame = started.elapsed().as_millis() / Self::SPINNER_FRAME_MS;
        symbols[frame as usize % symbols.len()]
    }

    fn render_input_row(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let suffix = format!(".{FILE_EXTENSION}");
        let suffix_width = suffix.chars().count() as u16;
        let input_area = Rect::new(
            area.x,
            area.y,
            area.width.saturating_sub(suffix_width + 1),
            1,
        );
        let suffix_area = Rect::new(
            input_area.right() + 1,
            area.y,
            suffix_width.min(area.width),
            1,
        );
        let focused = self.focus.get() == Focus::Filename;

        let input = self.input.borrow();
        let (visible, cursor_pos) = input.visible_text(input_area.width as usize);
        let mut text = visible;
        let text_width = text.chars().count();
        if text_width < input_area.width as usize {
            text.push_str(&" ".repeat(input_area.width as usize - text_width));
        }
        let input_style = if focused {
            Style::default()
                .fg(theme.text())
                .add_modifier(Modifier::UNDERLINED)
        } else {
            Style::default().fg(theme.text())
        };
        frame.render_widget(Paragraph::new(text).style(input_style), input_area);
        frame.render_widget(
            Paragraph::new(suffix).style(Style::default().fg(theme.text_muted())),
            suffix_area,
        );

        if focused {
            frame.set_cursor_position((input_area.x + cursor_pos as u16, input_area.y));
        }
    }

    fn render_alert(&self, frame: &mut Frame, area: Rect, message: &str, theme: &Theme) {
        let style = Style::default().fg(theme.error());
        let line = Line::from(vec![
            Span::styled("✖ ", style.add_modifier(Modifier::BOLD)),
            Span::styled(message.to_string(), style),
        ]);
        frame.render_widget(Paragraph::new(line).wrap(Wrap { trim: true }), area);
    }

    fn render_buttons(&self, frame: &mut Frame, area: Rect, in_flight: bool, theme: &Theme) {
        let download_focused = self.focus.get() == Focus::Download;
        let cancel_focused = self.focus.get() == Focus::Cancel;

        let cancel_style = if cancel_focused {
            Style::default()
                .bg(theme.error())
                .fg(theme.panel_bg())
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.error())
        };
        let download_style = if in_flight {
            Style::default().fg(theme.text_muted())
        } else if download_focused {
            Style::default()
                .bg(theme.accent())
                .fg(theme.panel_bg())
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.accent())
        };
        let download_label = if in_flight {
            format!("[ {} Download ]", self.spinner_frame())
        } else {
            "[ ↓ Download ]".to_string()
        };

        let buttons = Line::from(vec![
            Span::styled("[ Cancel ]", cancel_style),
            Span::raw("  "),
            Span::styled(download_label, download_style),
        ]);
        frame.render_widget(
            Paragraph::new(Text::from(buttons)).alignment(Alignment::Right),
            area,
        );
    }

    fn content_height(&self) -> u16 {
        let alert = if self.controller.borrow().state().error().is_some() {
            Self::ALERT_HEIGHT
        } else {
            0
        };
        // section title, input, spacer, description, alert, spacer, buttons
        1 + 1 + 1 + Self::DESCRIPTION_HEIGHT + alert + 1 + 1
    }
}

impl crate::widgets::Widget for DownloadDialog {
    fn help(&self) -> Option<&[help::Entry<'_>]> {
        Some(self.help_entries.as_slice())
    }

    fn is_animating(&self) -> bool {
        self.is_in_flight()
    }

    fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        fill_bg(frame.buffer_mut(), area, theme.panel_bg());
        let title = Line::styled(
            pad(Self::TITLE, 1),
            Style::default()
                .fg(theme.accent())
                .add_modifier(Modifier::BOLD),
        )
        .centered();
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .title(title)
            .border_style(Style::default().fg(theme.border()))
            .style(Style::default().bg(theme.panel_bg()).fg(theme.text()));

        frame.render_widget(block.clone(), area);
        let inner = block.inner(area).inner(Margin::new(1, 1));

        let (in_flight, error) = {
            let controller = self.controller.borrow();
            (
                controller.state().is_in_flight(),
                controller.state().error().map(str::to_owned),
            )
        };
        if !in_flight {
            self.in_flight_since.set(None);
        }

        let mut rows = vec![
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(Self::DESCRIPTION_HEIGHT),
        ];
        if error.is_some() {
            rows.push(Constraint::Length(Self::ALERT_HEIGHT));
        }
        rows.push(Constraint::Length(1));
        rows.push(Constraint::Length(1));
        let layout = Layout::vertical(rows).split(inner);

        let section_title = Line::styled(
            "File name",
            Style::default()
                .fg(theme.text())
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(Paragraph::new(section_title), layout[0]);
        self.render_input_row(frame, layout[1], theme);

        let description = Paragraph::new(self.description.borrow().clone())
            .style(Style::default().fg(theme.text_muted()))
            .wrap(Wrap { trim: true });
        frame.render_widget(description, layout[3]);

        if let Some(message) = error.as_deref() {
            self.render_alert(frame, layout[4], message, theme);
        }
        let button_row = layout.len() - 1;
        self.render_buttons(frame, layout[button_row], in_flight, theme);
    }
}

impl Popup for DownloadDialog {
    fn rect(&self, area: Rect) -> Rect {
        let min_width = 48;
        let max_width = 80;
        let width = ((area.width as f32 * 0.6) as u16)
            .clamp(min_width, max_width)
            .min(area.width.saturating_sub(4).max(1));
        // borders and inner margin
        let height = (self.content_height() + 4).min(area.height);
        let x = area.x + area.width.saturating_sub(width) / 2;
        let y = area.y + area.height.saturating_sub(height) / 2;
        Rect {
            x,
            y,
            width,
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use ratatui::{Terminal, backend::TestBackend};
    use vlogs_export::{
        download::{DEFAULT_FILENAME, DownloadEvent},
        error::TransferError,
    };

    use super::*;
    use crate::widgets::Widget;

    fn press(dialog: &DownloadDialog, code: KeyCode) -> DialogAction {
        dialog.handle_key(&KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn screen(dialog: &DownloadDialog) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal
            .draw(|frame| {
                let area = dialog.rect(frame.area());
                dialog.render(frame, area, &Theme::dark());
            })
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn typing_updates_controller_draft() {
        let dialog = DownloadDialog::new();
        for _ in 0..DEFAULT_FILENAME.chars().count() {
            press(&dialog, KeyCode::Backspace);
        }
        assert_eq!(dialog.controller().borrow().filename(), "");
        for c in "errors".chars() {
            press(&dialog, KeyCode::Char(c));
        }
        press(&dialog, KeyCode::Home);
        press(&dialog, KeyCode::Delete);
        assert_eq!(dialog.controller().borrow().filename(), "rrors");
    }

    #[test]
    fn enter_in_field_requests_download() {
        let dialog = DownloadDialog::new();
        assert_eq!(press(&dialog, KeyCode::Enter), DialogAction::Download);
    }

    #[test]
    fn download_is_disabled_while_in_flight() {
        let dialog = DownloadDialog::new();
        let _pending = dialog.controller().borrow_mut().begin(None);
        assert_eq!(press(&dialog, KeyCode::Enter), DialogAction::None);
        press(&dialog, KeyCode::Tab);
        assert_eq!(press(&dialog, KeyCode::Enter), DialogAction::None);
    }

    #[test]
    fn buttons_cycle_and_cancel_closes() {
        let dialog = DownloadDialog::new();
        press(&dialog, KeyCode::Tab);
        assert_eq!(press(&dialog, KeyCode::Enter), DialogAction::Download);
        press(&dialog, KeyCode::Right);
        assert_eq!(press(&dialog, KeyCode::Enter), DialogAction::Close);
        assert_eq!(press(&dialog, KeyCode::Esc), DialogAction::Close);
    }

    #[test]
    fn render_shows_field_suffix_and_summary() {
        let dialog = DownloadDialog::new();
        dialog.set_summary("a - b (+00:00)", "1:2");
        let screen = screen(&dialog);
        assert!(screen.contains("Download logs"));
        assert!(screen.contains("vmui_logs_export"));
        assert!(screen.contains(".jsonl"));
        assert!(screen.contains("File name"));
        assert!(!screen.contains("✖"));
    }

    #[test]
    fn render_shows_failure_message() {
        let dialog = DownloadDialog::new();
        let pending = dialog.controller().borrow_mut().begin(None).unwrap();
        dialog.controller().borrow_mut().finish(DownloadEvent {
            id: pending.id(),
            result: Err(TransferError::Other("network error".to_string())),
        });
        let screen = screen(&dialog);
        assert!(screen.contains("network error"));
    }
}
