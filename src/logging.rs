use std::{fs, path::PathBuf, sync::Mutex};

use color_eyre::{Result, eyre::WrapErr};
use directories::ProjectDirs;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt::writer::BoxMakeWriter, layer::SubscriberExt, util::SubscriberInitExt,
};

pub const LOG_ENV: &str = "VLOGS_EXPORT_LOG";
const LOG_FILE_NAME: &str = "vlogs-export.log";

pub enum LogTarget {
    /// The TUI owns the terminal, so it logs to a file.
    File(PathBuf),
    Stderr,
}

pub fn default_log_file() -> PathBuf {
    ProjectDirs::from("", "", "vlogs-export")
        .map(|dirs| dirs.cache_dir().join(LOG_FILE_NAME))
        .unwrap_or_else(|| std::env::temp_dir().join(LOG_FILE_NAME))
}

fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn filter(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        let level = level_for(verbose);
        EnvFilter::new(format!("warn,vlogs_export={level}"))
    })
}

pub fn init(verbose: u8, target: LogTarget) -> Result<()> {
    let (writer, ansi) = match target {
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .wrap_err_with(|| format!("creating log directory {}", parent.display()))?;
            }
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .wrap_err_with(|| format!("opening log file {}", path.display()))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        LogTarget::Stderr => (BoxMakeWriter::new(std::io::stderr), true),
    };

    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi),
        )
        .with(ErrorLayer::default())
        .try_init()
        .wrap_err("installing tracing subscriber")?;
    Ok(())
}
