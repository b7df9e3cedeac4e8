//! Streams the result of a LogsQL query from a VictoriaLogs server into a
//! local file.

use std::{
    path::{Component, Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::Url;
use tokio::{fs, io::AsyncWriteExt};
use tracing::Instrument;

use super::{ExportOutcome, Transfer, debug::debug_transfer_delay};
use crate::{
    download::ExportRequest,
    error::TransferError,
    query::{ACCOUNT_ID, PROJECT_ID},
};

const QUERY_PATH: &str = "select/logsql/query";
const PARTIAL_SUFFIX: &str = ".part";

#[derive(Debug)]
pub struct HttpTransfer {
    client: reqwest::Client,
    endpoint: Url,
    output_dir: PathBuf,
}

impl HttpTransfer {
    /// * `server_url` - Base URL of the server, e.g. `http://localhost:9428`.
    /// * `output_dir` - Directory the exported files are written to.
    pub fn new(
        server_url: &str,
        output_dir: impl Into<PathBuf>,
        timeout: Option<Duration>,
    ) -> Result<Self, TransferError> {
        let endpoint = query_endpoint(server_url)?;
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("vlogs-export/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            endpoint,
            output_dir: output_dir.into(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn send(&self, request: &ExportRequest) -> Result<reqwest::Response, TransferError> {
        let params = request.params();
        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .form(params.as_map());
        for header in [ACCOUNT_ID, PROJECT_ID] {
            if let Some(value) = params.get(header) {
                builder = builder.header(header, value);
            }
        }
        let response = builder.send().await?;
        ensure_success(response).await
    }
}

#[async_trait]
impl Transfer for HttpTransfer {
    async fn transfer(
        &self,
        request: &ExportRequest,
        cancel: &AtomicBool,
    ) -> Result<ExportOutcome, TransferError> {
        let filename = checked_filename(request.filename())?;
        debug_transfer_delay().await;
        if cancel.load(Ordering::Relaxed) {
            return Err(TransferError::Canceled);
        }

        let span = tracing::trace_span!(
            "logsql_query",
            endpoint = %self.endpoint,
            filename = %filename
        );
        let response = self.send(request).instrument(span).await?;

        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| TransferError::Io {
                path: self.output_dir.clone(),
                source,
            })?;
        let path = self.output_dir.join(filename);
        // Unique per invocation and removed on drop, so an aborted or
        // canceled download never touches another one's file.
        let (file, partial) = tempfile::Builder::new()
            .prefix(&format!(".{filename}."))
            .suffix(PARTIAL_SUFFIX)
            .tempfile_in(&self.output_dir)
            .map_err(|source| TransferError::Io {
                path: path.clone(),
                source,
            })?
            .into_parts();

        let written = match write_body(response, fs::File::from_std(file), &partial, cancel).await
        {
            Ok(_) if cancel.load(Ordering::Relaxed) => Err(TransferError::Canceled),
            written => written,
        };
        match written {
            Ok((bytes, lines)) => {
                partial
                    .persist(&path)
                    .map_err(|err| TransferError::Io {
                        path: path.clone(),
                        source: err.error,
                    })?;
                Ok(ExportOutcome { path, bytes, lines })
            }
            Err(err) => {
                let partial_display = partial.display().to_string();
                if let Err(remove_err) = partial.close() {
                    tracing::warn!(
                        path = %partial_display,
                        error = %remove_err,
                        "partial_file_cleanup_failed"
                    );
                }
                Err(err)
            }
        }
    }
}

/// The file name must name a single entry directly inside the output
/// directory.
fn checked_filename(name: &str) -> Result<&str, TransferError> {
    let invalid = || TransferError::InvalidFilename {
        name: name.to_string(),
    };
    if name.contains(['/', '\\']) {
        return Err(invalid());
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(invalid()),
    }
}

fn query_endpoint(server_url: &str) -> Result<Url, TransferError> {
    let base = server_url.trim().trim_end_matches('/');
    let invalid = |message: String| TransferError::InvalidUrl {
        url: server_url.to_string(),
        message,
    };
    let url = Url::parse(&format!("{base}/{QUERY_PATH}")).map_err(|err| invalid(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    Ok(url)
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, TransferError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(TransferError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

async fn write_body(
    mut response: reqwest::Response,
    mut file: fs::File,
    path: &Path,
    cancel: &AtomicBool,
) -> Result<(u64, u64), TransferError> {
    let io_err = |source| TransferError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut bytes = 0u64;
    let mut lines = 0u64;
    while let Some(chunk) = response.chunk().await? {
        if cancel.load(Ordering::Relaxed) {
            return Err(TransferError::Canceled);
        }
        file.write_all(&chunk).await.map_err(io_err)?;
        bytes += chunk.len() as u64;
        lines += chunk.iter().filter(|byte| **byte == b'\n').count() as u64;
    }
    file.flush().await.map_err(io_err)?;
    Ok((bytes, lines))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_endpoint_appends_path_once() {
        let url = query_endpoint("http://localhost:9428/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9428/select/logsql/query");
        let url = query_endpoint("https://logs.example.com/vl").unwrap();
        assert_eq!(url.as_str(), "https://logs.example.com/vl/select/logsql/query");
    }

    #[test]
    fn query_endpoint_rejects_non_http() {
        let err = query_endpoint("ftp://logs.example.com").unwrap_err();
        assert!(err.to_string().contains("unsupported scheme 'ftp'"));
        assert!(matches!(
            query_endpoint("not a url"),
            Err(TransferError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn checked_filename_accepts_plain_names() {
        assert_eq!(checked_filename("my export.jsonl").unwrap(), "my export.jsonl");
        assert_eq!(checked_filename("..jsonl").unwrap(), "..jsonl");
    }

    #[test]
    fn checked_filename_rejects_paths() {
        for name in [
            "/abs/dir/escaped.jsonl",
            "../escaped.jsonl",
            "sub/name.jsonl",
            "sub\\name.jsonl",
            "..",
            ".",
            "",
        ] {
            assert!(
                matches!(
                    checked_filename(name),
                    Err(TransferError::InvalidFilename { .. })
                ),
                "{name}"
            );
        }
    }
}
