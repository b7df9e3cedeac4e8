use std::{path::PathBuf, sync::atomic::AtomicBool};

use async_trait::async_trait;

use crate::{download::ExportRequest, error::TransferError};

mod debug;
pub mod http;

pub use http::HttpTransfer;

/// The file a successful transfer produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub bytes: u64,
    pub lines: u64,
}

/// Retrieves the logs for an export request and saves them.
///
/// Implementations should check `cancel` between units of work and return
/// [`TransferError::Canceled`] once it is set.
#[async_trait]
pub trait Transfer: Send + Sync {
    async fn transfer(
        &self,
        request: &ExportRequest,
        cancel: &AtomicBool,
    ) -> Result<ExportOutcome, TransferError>;
}
