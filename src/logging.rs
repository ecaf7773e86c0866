//! Logging initialization
//!
//! Progress lines go to stderr; when a log file is given they are also
//! written there through a non-blocking appender.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging for a pipeline run
///
/// Filter precedence: RUST_LOG, then `filter`, then "info".
///
/// The returned guard flushes the file appender on drop and must be kept
/// alive until the process exits.
pub fn init_logging(filter: Option<&str>, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = build_filter(std::env::var("RUST_LOG").ok().as_deref(), filter);

    let (file_layer, guard) = match log_file.and_then(split_log_path) {
        Some((dir, file_name)) => {
            if let Err(e) = std::fs::create_dir_all(dir) {
                eprintln!("Failed to create log directory {:?}: {}", dir, e);
                (None, None)
            } else {
                let appender = tracing_appender::rolling::never(dir, file_name);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true);
                (Some(layer), Some(guard))
            }
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(file_layer)
        .with(env_filter)
        .init();

    guard
}

fn build_filter(rust_log: Option<&str>, configured: Option<&str>) -> EnvFilter {
    rust_log
        .or(configured)
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn split_log_path(path: &Path) -> Option<(&Path, &std::ffi::OsStr)> {
    let file_name = path.file_name()?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Some((dir, file_name))
}
