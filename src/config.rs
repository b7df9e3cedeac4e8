//! Settings resolved from command-line flags, then environment variables,
//! then defaults.

use std::{env, path::PathBuf, time::Duration};

use directories::BaseDirs;
use reqwest::Url;

use crate::error::ConfigError;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:9428";

pub const SERVER_ENV: &str = "VLOGS_EXPORT_SERVER";
pub const OUTPUT_DIR_ENV: &str = "VLOGS_EXPORT_OUTPUT_DIR";
pub const ON_CLOSE_ENV: &str = "VLOGS_EXPORT_ON_CLOSE";
pub const TIMEOUT_ENV: &str = "VLOGS_EXPORT_TIMEOUT_SECS";

/// What closing the dialog does to a download that is still running.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClosePolicy {
    /// Keep the download running; the dialog shows its result when reopened.
    #[default]
    Detach,
    Cancel,
}

impl ClosePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("detach") {
            Some(Self::Detach)
        } else if value.eq_ignore_ascii_case("cancel") {
            Some(Self::Cancel)
        } else {
            None
        }
    }
}

/// Values given on the command line. `None` falls through to the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub on_close: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub server_url: String,
    pub output_dir: PathBuf,
    pub close_policy: ClosePolicy,
    pub timeout: Option<Duration>,
}

impl Config {
    pub fn load(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        Self::resolve(overrides, |name| env::var(name).ok())
    }

    pub fn resolve(
        overrides: ConfigOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let lookup = |name: &str| env(name).filter(|value| !value.trim().is_empty());

        let server_url = overrides
            .server_url
            .or_else(|| lookup(SERVER_ENV))
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        let server_url = validate_server_url(&server_url)?;

        let output_dir = overrides
            .output_dir
            .or_else(|| lookup(OUTPUT_DIR_ENV).map(|value| expand_home(&value)))
            .unwrap_or_else(default_output_dir);

        let close_policy = match overrides.on_close.or_else(|| lookup(ON_CLOSE_ENV)) {
            Some(value) => {
                ClosePolicy::parse(value.trim()).ok_or(ConfigError::InvalidValue {
                    setting: "on-close policy",
                    value,
                    expected: "'detach' or 'cancel'",
                })?
            }
            None => ClosePolicy::default(),
        };

        let timeout_secs = match overrides.timeout_secs {
            Some(secs) => Some(secs),
            None => match lookup(TIMEOUT_ENV) {
                Some(value) => Some(value.trim().parse::<u64>().map_err(|_| {
                    ConfigError::InvalidValue {
                        setting: "request timeout",
                        value,
                        expected: "a whole number of seconds",
                    }
                })?),
                None => None,
            },
        };
        let timeout = timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            server_url,
            output_dir,
            close_policy,
            timeout,
        })
    }
}

fn validate_server_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let invalid = || ConfigError::InvalidValue {
        setting: "server URL",
        value: raw.to_string(),
        expected: "an http:// or https:// URL",
    };
    let url = Url::parse(trimmed).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }
    Ok(trimmed.to_string())
}

fn default_output_dir() -> PathBuf {
    match env::current_dir() {
        Ok(dir) => dir,
        Err(_) => env::temp_dir(),
    }
}

/// Expands a leading `~` to the home directory.
pub fn expand_home(value: &str) -> PathBuf {
    let trimmed = value.trim();
    if trimmed == "~"
        && let Some(base) = BaseDirs::new()
    {
        return base.home_dir().to_path_buf();
    }
    if let Some(rest) = trimmed.strip_prefix("~/")
        && let Some(base) = BaseDirs::new()
    {
        return base.home_dir().join(rest);
    }
    PathBuf::from(trimmed)
}
