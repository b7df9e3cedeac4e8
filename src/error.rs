use std::path::PathBuf;

#[derive(Debug)]
pub enum TransferError {
    InvalidUrl { url: String, message: String },
    InvalidFilename { name: String },
    Request(reqwest::Error),
    Status { status: u16, body: String },
    Io { path: PathBuf, source: std::io::Error },
    Canceled,
    Other(String),
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferError::InvalidUrl { url, message } => {
                write!(f, "Invalid server URL '{}': {}", url, message)
            }
            TransferError::InvalidFilename { name } => write!(
                f,
                "Invalid file name '{}': use a plain name without '/', '\\' or '..'",
                name
            ),
            TransferError::Request(err) => write!(f, "Request failed: {}", err),
            TransferError::Status { status, body } => {
                let body = body.trim();
                if body.is_empty() {
                    write!(f, "Server responded with status {}", status)
                } else {
                    write!(f, "Server responded with status {}: {}", status, body)
                }
            }
            TransferError::Io { path, source } => {
                write!(f, "Failed to write {}: {}", path.display(), source)
            }
            TransferError::Canceled => write!(f, "Download canceled"),
            TransferError::Other(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Request(err) => Some(err),
            TransferError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(err: reqwest::Error) -> Self {
        TransferError::Request(err)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        setting: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue {
                setting,
                value,
                expected,
            } => write!(
                f,
                "Invalid value '{}' for {}: expected {}",
                value, setting, expected
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_renders_message_verbatim() {
        let err = TransferError::Other("network error".to_string());
        assert_eq!(err.to_string(), "network error");
    }

    #[test]
    fn invalid_filename_names_the_input() {
        let err = TransferError::InvalidFilename {
            name: "../escaped.jsonl".to_string(),
        };
        assert!(err.to_string().starts_with("Invalid file name '../escaped.jsonl'"));
    }

    #[test]
    fn status_includes_trimmed_body() {
        let err = TransferError::Status {
            status: 400,
            body: "cannot parse query\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Server responded with status 400: cannot parse query"
        );
        let err = TransferError::Status {
            status: 502,
            body: String::new(),
        };
        assert_eq!(err.to_string(), "Server responded with status 502");
    }
}
