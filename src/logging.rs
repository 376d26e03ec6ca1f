//! Logging setup: rotating text and JSON files plus compact terminal output.
//!
//! `RUST_LOG` controls filtering (default `info`), e.g.
//! `RUST_LOG=corpus_crawler=debug,reqwest=warn`.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Keeps the background log writers alive. Dropping it flushes and stops file logging.
#[must_use = "file logging stops when the guard is dropped"]
pub struct LogGuard {
    _text: WorkerGuard,
    _json: WorkerGuard,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global subscriber.
///
/// Writes `crawler.log` (text) and `crawler.json.log` (structured) into `log_dir`, both
/// rotated daily, and a compact stream on stdout.
pub fn init_logging<P: AsRef<Path>>(log_dir: P) -> Result<LogGuard, Box<dyn std::error::Error>> {
    let log_path = log_dir.as_ref();
    std::fs::create_dir_all(log_path)?;

    let text_file_appender = tracing_appender::rolling::daily(log_path, "crawler.log");
    let (text_writer, text_guard) = tracing_appender::non_blocking(text_file_appender);

    let json_file_appender = tracing_appender::rolling::daily(log_path, "crawler.json.log");
    let (json_writer, json_guard) = tracing_appender::non_blocking(json_file_appender);

    let text_layer = fmt::layer()
        .with_writer(text_writer)
        .with_target(true)
        .with_thread_names(true) // worker-N
        .with_line_number(true)
        .with_ansi(false)
        .compact()
        .with_filter(env_filter());

    let json_layer = fmt::layer()
        .json()
        .with_writer(json_writer)
        .with_target(true)
        .with_thread_names(true)
        .with_current_span(true)
        .with_filter(env_filter());

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .with_filter(env_filter());

    tracing_subscriber::registry()
        .with(text_layer)
        .with(json_layer)
        .with(stdout_layer)
        .try_init()?;

    tracing::debug!("Logging initialized - logs will be written to {}", log_path.display());

    Ok(LogGuard {
        _text: text_guard,
        _json: json_guard,
    })
}

/// Same as [`init_logging`], writing into `<data_dir>/logs`.
pub fn init_logging_in_data_dir<P: AsRef<Path>>(data_dir: P) -> Result<LogGuard, Box<dyn std::error::Error>> {
    init_logging(data_dir.as_ref().join("logs"))
}
