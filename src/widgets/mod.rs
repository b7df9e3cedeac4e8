use std::sync::Arc;

use crossterm::event::Event;
use ratatui::{Frame, layout::Rect};
use theme::Theme;
use vlogs_export::download::DownloadEvent;

mod download_dialog;
mod logs_view;
pub mod theme;

pub use logs_view::LogsView;

use crate::help;

/// Handle given to widgets and their background tasks to reach the app loop.
pub trait Env {
    fn invalidate(&self);
    fn download_finished(&self, event: DownloadEvent);
}

pub type EnvHandle = Arc<dyn Env + Send + Sync>;

/// State lives behind interior mutability; the app loop only holds `&self`.
pub trait Widget {
    fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme);

    /// Handle input events. Returns true if the event was handled.
    fn handle_event(&self, _env: EnvHandle, _event: &Event) -> bool {
        false
    }

    /// Result of a download started by this widget.
    fn on_download_finished(&self, _env: EnvHandle, _event: DownloadEvent) {}

    /// Whether the widget needs redrawing on every tick, e.g. for a spinner.
    fn is_animating(&self) -> bool {
        false
    }

    /// Optional help to display at the bottom while this widget is active
    fn help(&self) -> Option<&[help::Entry<'_>]> {
        None
    }
}

pub trait Popup: Widget {
    fn rect(&self, area: Rect) -> Rect;
}
