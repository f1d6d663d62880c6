//! File logging.
//!
//! The terminal belongs to the UI, so nothing is written to stdout or stderr.
//! Logs go to `<state dir>/hiitr.log`; `RUST_LOG` overrides the default
//! `info` filter.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::app_dirs::AppDirs;

pub const LOG_FILE_NAME: &str = "hiitr.log";

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber writing to the default log location.
///
/// The returned guard must live until shutdown so buffered lines get flushed.
/// `None` means logging is off: no state dir, or the directory could not be
/// created.
pub fn init() -> Option<WorkerGuard> {
    let dir = AppDirs::log_dir()?;
    init_in(&dir)
}

pub fn init_in(dir: &Path) -> Option<WorkerGuard> {
    std::fs::create_dir_all(dir).ok()?;

    let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    // a subscriber may already be installed (tests); keep it
    tracing_subscriber::registry()
        .with(file_layer)
        .with(filter())
        .try_init()
        .ok()?;

    tracing::info!(log_file = ?log_path(dir), "logging initialized");
    Some(guard)
}

pub fn log_path(dir: &Path) -> PathBuf {
    dir.join(LOG_FILE_NAME)
}
