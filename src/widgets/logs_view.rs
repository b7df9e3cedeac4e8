use std::{
    cell::{Cell, RefCell},
    sync::Arc,
};

use crossterm::event::{Event, KeyCode};
use humansize::{BINARY, format_size};
use unicode_width::UnicodeWidthStr;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell as TableCell, Clear, Paragraph, Row, Table},
};
use vlogs_export::{
    config::ClosePolicy, download::DownloadEvent, query::QueryParameters,
    summary::QuerySummary, transfer::Transfer, visibility::Visibility,
};

use super::{
    EnvHandle, Popup, Widget,
    download_dialog::{DialogAction, DownloadDialog},
    theme::Theme,
};
use crate::{help, util::abbreviate_home};

const KEY_HEADER: &str = "Parameter";

enum Status {
    Saved(String),
    Failed(String),
}

/// The query being viewed, with the dialog that exports its results.
pub struct LogsView {
    params: Option<QueryParameters>,
    server_url: String,
    transfer: Arc<dyn Transfer>,
    close_policy: ClosePolicy,
    visibility: Cell<Visibility>,
    summary: RefCell<QuerySummary>,
    dialog: DownloadDialog,
    status: RefCell<Option<Status>>,
    help_entries: Vec<help::Entry<'static>>,
}

impl LogsView {
    pub fn new(
        params: Option<QueryParameters>,
        server_url: impl Into<String>,
        transfer: Arc<dyn Transfer>,
        close_policy: ClosePolicy,
    ) -> Self {
        Self {
            params,
            server_url: server_url.into(),
            transfer,
            close_policy,
            visibility: Cell::new(Visibility::default()),
            summary: RefCell::new(QuerySummary::new()),
            dialog: DownloadDialog::new(),
            status: RefCell::new(None),
            help_entries: vec![
                help::Entry::new("d", "download"),
                help::Entry::new("q", "quit"),
            ],
        }
    }

    fn is_open(&self) -> bool {
        self.visibility.get().is_open()
    }

    fn open_dialog(&self) {
        let mut visibility = self.visibility.get();
        visibility.open();
        self.visibility.set(visibility);
    }

    fn close_dialog(&self) {
        let mut visibility = self.visibility.get();
        visibility.close();
        self.visibility.set(visibility);
        if self.close_policy == ClosePolicy::Cancel {
            self.dialog.controller().borrow_mut().cancel();
        }
    }

    fn start_download(&self, env: EnvHandle) {
        let notify = env.clone();
        let started = self.dialog.controller().borrow_mut().start_download(
            self.params.as_ref(),
            self.transfer.clone(),
            move |event| notify.download_finished(event),
        );
        if started.is_some() {
            self.status.replace(None);
            env.invalidate();
        }
    }

    fn render_params(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let block = Block::new()
            .borders(Borders::TOP)
            .title(Line::styled(
                format!(" Query on {} ", self.server_url),
                Style::default().fg(theme.accent()),
            ))
            .border_style(Style::default().fg(theme.border()));

        let params = match &self.params {
            Some(params) if !params.is_empty() => params,
            _ => {
                let hint = Paragraph::new(Line::styled(
                    "No query parameters. Pass --query, --start, --end or --param KEY=VALUE.",
                    Style::default().fg(theme.text_muted()),
                ))
                .block(block);
                frame.render_widget(hint, area);
                return;
            }
        };

        let header = Row::new([KEY_HEADER, "Value"]).style(
            Style::default()
                .fg(theme.text())
                .add_modifier(Modifier::BOLD),
        );
        let rows = params.iter().map(|(key, value)| {
            Row::new([
                TableCell::from(Span::styled(
                    key.to_string(),
                    Style::default().fg(theme.accent()),
                )),
                TableCell::from(value.to_string()),
            ])
        });
        let table = Table::new(
            rows,
            [
                Constraint::Length(key_column_width(params)),
                Constraint::Fill(1),
            ],
        )
        .header(header)
        .column_spacing(2)
        .style(Style::default().fg(theme.text()))
        .block(block);
        frame.render_widget(table, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let status = self.status.borrow();
        let line = match status.as_ref() {
            Some(Status::Saved(message)) => {
                Line::styled(message.as_str(), Style::default().fg(theme.success()))
            }
            Some(Status::Failed(message)) => Line::styled(
                format!("Download failed: {message}"),
                Style::default().fg(theme.error()),
            ),
            None => return,
        };
        frame.render_widget(Paragraph::new(line), area);
    }

    fn render_dialog(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        {
            let mut summary = self.summary.borrow_mut();
            let period = summary.period(self.params.as_ref()).to_string();
            let tenant = summary.tenant(self.params.as_ref());
            self.dialog.set_summary(&period, tenant);
        }
        let rect = self.dialog.rect(area);
        frame.render_widget(Clear, rect);
        self.dialog.render(frame, rect, theme);
    }
}

fn key_column_width(params: &QueryParameters) -> u16 {
    params
        .iter()
        .map(|(key, _)| key.width())
        .max()
        .unwrap_or(0)
        .max(KEY_HEADER.width()) as u16
}

impl Widget for LogsView {
    fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let layout = Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]);
        let [params_area, status_area] = area.layout(&layout);
        self.render_params(frame, params_area, theme);
        self.render_status(frame, status_area, theme);

        if self.is_open() {
            self.render_dialog(frame, area, theme);
        }
    }

    fn handle_event(&self, env: EnvHandle, event: &Event) -> bool {
        let Some(key) = event.as_key_press_event() else {
            return false;
        };

        if self.is_open() {
            match self.dialog.handle_key(&key) {
                DialogAction::Close => self.close_dialog(),
                DialogAction::Download => self.start_download(env),
                DialogAction::None => {}
            }
            return true;
        }

        match key.code {
            KeyCode::Char('d') | KeyCode::Enter => {
                self.open_dialog();
                true
            }
            _ => false,
        }
    }

    fn on_download_finished(&self, env: EnvHandle, event: DownloadEvent) {
        let applied = self.dialog.controller().borrow_mut().finish(event);
        let status = match applied {
            Some(Ok(outcome)) => Status::Saved(format!(
                "Saved {} lines ({}) to {}",
                outcome.lines,
                format_size(outcome.bytes, BINARY),
                abbreviate_home(&outcome.path)
            )),
            Some(Err(message)) => Status::Failed(message),
            None => return,
        };
        self.status.replace(Some(status));
        env.invalidate();
    }

    fn is_animating(&self) -> bool {
        self.is_open() && self.dialog.is_animating()
    }

    fn help(&self) -> Option<&[help::Entry<'_>]> {
        if self.is_open() {
            self.dialog.help()
        } else {
            Some(self.help_entries.as_slice())
        }
    }
}
