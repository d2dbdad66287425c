//! Tracing setup.
//!
//! The terminal UI owns stdout, so the interactive binary logs to a file under the user
//! cache directory; the headless binary logs to stderr.

use std::fs;
use std::path::PathBuf;

use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

const APP_DIR: &str = "matchday_predict";
const LOG_FILE: &str = "matchday_predict.log";

static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("No cache directory available for logs (set XDG_CACHE_HOME or HOME)")]
    NoCacheDir,
    #[error("Failed to prepare log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Installs a file subscriber and returns the log path. Later calls are no-ops.
pub fn init_file() -> Result<PathBuf, LoggingError> {
    let dir = log_dir().ok_or(LoggingError::NoCacheDir)?;
    let path = dir.join(LOG_FILE);
    if LOG_GUARD.get().is_some() {
        return Ok(path);
    }
    fs::create_dir_all(&dir).map_err(|source| LoggingError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    let appender = tracing_appender::rolling::never(&dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer().with_ansi(false).with_writer(writer);
    let subscriber = Registry::default().with(env_filter()).with(file_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = LOG_GUARD.set(guard);

    tracing::info!("Logging initialized; log file at {}", path.display());
    Ok(path)
}

pub fn init_stderr() -> Result<(), LoggingError> {
    let layer = fmt::layer().with_writer(std::io::stderr);
    let subscriber = Registry::default().with(env_filter()).with(layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn log_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(APP_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(APP_DIR))
}
