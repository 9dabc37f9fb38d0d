//! Tracing setup shared by every entry point.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::get_logs_dir;

const LOG_FILE_PREFIX: &str = "crop-diagnosis-uploader.log";

/// Filter used when `RUST_LOG` is not set
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Install logging with the file layer under `~/.crop-diagnosis-uploader/logs`
pub fn init(verbose: bool) -> Option<WorkerGuard> {
    match get_logs_dir() {
        Ok(logs_dir) => init_with_logs_dir(verbose, Some(logs_dir)),
        Err(e) => {
            eprintln!("[WARN] File logging disabled: {}", e);
            init_with_logs_dir(verbose, None)
        }
    }
}

/// Install the stderr layer and, when `logs_dir` is given and usable, a daily
/// JSON log file inside it. Hold on to the returned guard until exit so
/// buffered file output is flushed. Calling this twice leaves the first
/// subscriber in place.
pub fn init_with_logs_dir(verbose: bool, logs_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter());

    let (file_layer, guard) = match logs_dir.map(file_appender).transpose() {
        Ok(Some(appender)) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        Ok(None) => (None, None),
        Err(e) => {
            eprintln!("[WARN] File logging disabled: {}", e);
            (None, None)
        }
    };

    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    guard
}

fn file_appender(logs_dir: PathBuf) -> Result<RollingFileAppender, String> {
    std::fs::create_dir_all(&logs_dir)
        .map_err(|e| format!("Failed to create logs directory: {}", e))?;
    Ok(tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX))
}
