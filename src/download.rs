//! Download orchestration: the filename draft, the export request it turns
//! into, and the lifecycle of the transfer that request drives.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use tokio::task::{AbortHandle, JoinHandle};

use crate::{
    error::TransferError,
    query::QueryParameters,
    transfer::{ExportOutcome, Transfer},
};

pub const FILE_EXTENSION: &str = "jsonl";
pub const DEFAULT_FILENAME: &str = "vmui_logs_export";

/// Final output filename for a draft: trimmed, defaulted when blank, with the
/// export extension appended.
pub fn target_filename(draft: &str) -> String {
    let name = draft.trim();
    let name = if name.is_empty() {
        DEFAULT_FILENAME
    } else {
        name
    };
    format!("{name}.{FILE_EXTENSION}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    filename: String,
    params: QueryParameters,
}

impl ExportRequest {
    pub fn new(filename: impl Into<String>, params: QueryParameters) -> Self {
        Self {
            filename: filename.into(),
            params,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn params(&self) -> &QueryParameters {
        &self.params
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DownloadState {
    #[default]
    Idle,
    InFlight,
    Failed(String),
}

impl DownloadState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, DownloadState::InFlight)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            DownloadState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DownloadId(u64);

/// Result of one invocation, posted back to the controller that started it.
#[derive(Debug)]
pub struct DownloadEvent {
    pub id: DownloadId,
    pub result: Result<ExportOutcome, TransferError>,
}

/// A started download that has not been handed to a transfer yet.
#[derive(Debug)]
pub struct PendingDownload {
    id: DownloadId,
    request: ExportRequest,
    cancel: Arc<AtomicBool>,
}

impl PendingDownload {
    pub fn id(&self) -> DownloadId {
        self.id
    }

    pub fn request(&self) -> &ExportRequest {
        &self.request
    }

    pub async fn run(self, transfer: &dyn Transfer) -> DownloadEvent {
        let started = Instant::now();
        let result = transfer.transfer(&self.request, &self.cancel).await;
        tracing::debug!(
            download_id = self.id.0,
            filename = %self.request.filename,
            ok = result.is_ok(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "transfer_done"
        );
        DownloadEvent {
            id: self.id,
            result,
        }
    }
}

struct ActiveDownload {
    id: DownloadId,
    cancel: Arc<AtomicBool>,
    task: Option<AbortHandle>,
}

/// Owns the filename draft and the state of the export it drives.
///
/// At most one download is in flight per controller. Results are matched by
/// invocation id, so a result that arrives after a cancel is dropped.
pub struct DownloadController {
    filename: String,
    state: DownloadState,
    next_id: u64,
    active: Option<ActiveDownload>,
}

impl Default for DownloadController {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadController {
    pub fn new() -> Self {
        Self {
            filename: DEFAULT_FILENAME.to_string(),
            state: DownloadState::Idle,
            next_id: 0,
            active: None,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn set_filename(&mut self, value: impl Into<String>) {
        self.filename = value.into();
    }

    pub fn state(&self) -> &DownloadState {
        &self.state
    }

    /// Builds the export request and moves to `InFlight`.
    ///
    /// Returns `None` while another download is in flight.
    pub fn begin(&mut self, params: Option<&QueryParameters>) -> Option<PendingDownload> {
        if self.state.is_in_flight() {
            tracing::debug!(filename = %self.filename, "download_already_in_flight");
            return None;
        }
        let request = ExportRequest::new(
            target_filename(&self.filename),
            params.cloned().unwrap_or_default(),
        );
        self.next_id += 1;
        let id = DownloadId(self.next_id);
        let cancel = Arc::new(AtomicBool::new(false));
        self.active = Some(ActiveDownload {
            id,
            cancel: cancel.clone(),
            task: None,
        });
        self.state = DownloadState::InFlight;
        tracing::info!(
            download_id = id.0,
            filename = %request.filename,
            params = request.params.len(),
            "download_started"
        );
        Some(PendingDownload {
            id,
            request,
            cancel,
        })
    }

    /// Applies the result of the active invocation. Results of any other
    /// invocation are ignored and `None` is returned.
    pub fn finish(&mut self, event: DownloadEvent) -> Option<Result<ExportOutcome, String>> {
        match &self.active {
            Some(active) if active.id == event.id => {}
            _ => {
                tracing::debug!(download_id = event.id.0, "stale_download_result");
                return None;
            }
        }
        self.active = None;
        match event.result {
            Ok(outcome) => {
                tracing::info!(
                    download_id = event.id.0,
                    path = %outcome.path.display(),
                    bytes = outcome.bytes,
                    lines = outcome.lines,
                    "download_finished"
                );
                self.state = DownloadState::Idle;
                Some(Ok(outcome))
            }
            Err(err) => {
                let message = err.to_string();
                tracing::error!(download_id = event.id.0, error = %message, "download_failed");
                self.state = DownloadState::Failed(message.clone());
                Some(Err(message))
            }
        }
    }

    /// Cancels the in-flight download, if any. The transfer is asked to stop,
    /// a task spawned by [`DownloadController::start_download`] is aborted,
    /// and any result that still arrives is ignored.
    pub fn cancel(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        active.cancel.store(true, Ordering::Relaxed);
        if let Some(task) = active.task {
            task.abort();
        }
        tracing::info!(download_id = active.id.0, "download_canceled");
        self.state = DownloadState::Failed(TransferError::Canceled.to_string());
        true
    }

    /// Starts a download on a background task; `notify` receives the result,
    /// which should be fed back through [`DownloadController::finish`].
    ///
    /// The state is `InFlight` once this returns `Some`.
    pub fn start_download<F>(
        &mut self,
        params: Option<&QueryParameters>,
        transfer: Arc<dyn Transfer>,
        notify: F,
    ) -> Option<JoinHandle<()>>
    where
        F: FnOnce(DownloadEvent) + Send + 'static,
    {
        let pending = self.begin(params)?;
        let handle = tokio::spawn(async move {
            let event = pending.run(transfer.as_ref()).await;
            notify(event);
        });
        if let Some(active) = self.active.as_mut() {
            active.task = Some(handle.abort_handle());
        }
        Some(handle)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn outcome() -> ExportOutcome {
        ExportOutcome {
            path: PathBuf::from("vmui_logs_export.jsonl"),
            bytes: 12,
            lines: 1,
        }
    }

    #[test]
    fn target_filename_defaults_blank_drafts() {
        assert_eq!(target_filename(""), "vmui_logs_export.jsonl");
        assert_eq!(target_filename("   "), "vmui_logs_export.jsonl");
    }

    #[test]
    fn target_filename_trims_outer_whitespace_only() {
        assert_eq!(target_filename("  my export  "), "my export.jsonl");
        assert_eq!(target_filename("logs"), "logs.jsonl");
    }

    #[test]
    fn begin_builds_request_and_moves_in_flight() {
        let mut controller = DownloadController::new();
        controller.set_filename("  errors ");
        let params: QueryParameters = [("query", "error"), ("AccountID", "3")]
            .into_iter()
            .collect();

        let pending = controller.begin(Some(&params)).unwrap();
        assert_eq!(pending.request().filename(), "errors.jsonl");
        assert_eq!(pending.request().params(), &params);
        assert_eq!(controller.state(), &DownloadState::InFlight);
        assert_eq!(controller.filename(), "  errors ");
    }

    #[test]
    fn begin_without_params_sends_empty_mapping() {
        let mut controller = DownloadController::new();
        let pending = controller.begin(None).unwrap();
        assert!(pending.request().params().is_empty());
        assert_eq!(pending.request().filename(), "vmui_logs_export.jsonl");
    }

    #[test]
    fn begin_is_ignored_while_in_flight() {
        let mut controller = DownloadController::new();
        assert!(controller.begin(None).is_some());
        assert!(controller.begin(None).is_none());
        assert!(controller.state().is_in_flight());
    }

    #[test]
    fn finish_success_returns_to_idle() {
        let mut controller = DownloadController::new();
        let pending = controller.begin(None).unwrap();
        let applied = controller.finish(DownloadEvent {
            id: pending.id(),
            result: Ok(outcome()),
        });
        assert_eq!(applied, Some(Ok(outcome())));
        assert_eq!(controller.state(), &DownloadState::Idle);
    }

    #[test]
    fn finish_failure_keeps_message_until_retry() {
        let mut controller = DownloadController::new();
        let pending = controller.begin(None).unwrap();
        controller.finish(DownloadEvent {
            id: pending.id(),
            result: Err(TransferError::Other("network error".to_string())),
        });
        assert_eq!(controller.state().error(), Some("network error"));

        assert!(controller.begin(None).is_some());
        assert_eq!(controller.state(), &DownloadState::InFlight);
        assert_eq!(controller.state().error(), None);
    }

    #[test]
    fn results_from_other_invocations_are_dropped() {
        let mut controller = DownloadController::new();
        let first = controller.begin(None).unwrap();
        controller.finish(DownloadEvent {
            id: first.id(),
            result: Ok(outcome()),
        });
        let second = controller.begin(None).unwrap();
        assert_ne!(first.id(), second.id());

        let applied = controller.finish(DownloadEvent {
            id: first.id(),
            result: Err(TransferError::Other("late".to_string())),
        });
        assert!(applied.is_none());
        assert!(controller.state().is_in_flight());
    }

    #[test]
    fn cancel_exits_in_flight_once() {
        let mut controller = DownloadController::new();
        assert!(!controller.cancel());

        let pending = controller.begin(None).unwrap();
        assert!(controller.cancel());
        assert!(pending.cancel.load(Ordering::Relaxed));
        assert_eq!(controller.state().error(), Some("Download canceled"));

        let applied = controller.finish(DownloadEvent {
            id: pending.id(),
            result: Ok(outcome()),
        });
        assert!(applied.is_none());
        assert_eq!(controller.state().error(), Some("Download canceled"));
    }
}
