//! Logging setup: rotating text and JSON log files plus terminal output.
//!
//! Filtering follows `RUST_LOG` and falls back to `info`, e.g.
//! `RUST_LOG=vendor_disclosure=debug,reqwest=warn`.

use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn env_filter() -> Result<EnvFilter, Box<dyn std::error::Error>> {
    Ok(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?)
}

/// Initialize the tracing subscriber with file and stderr layers.
///
/// Writes `vendor_disclosure.log` (compact text) and
/// `vendor_disclosure.json.log` (one JSON object per event) under `log_dir`,
/// rotated daily.
///
/// # Errors
/// Fails if the directory cannot be created or a subscriber is already set.
pub fn init_logging<P: AsRef<Path>>(log_dir: P) -> Result<(), Box<dyn std::error::Error>> {
    let log_path = log_dir.as_ref();
    std::fs::create_dir_all(log_path)?;

    let env_filter = env_filter()?;

    let text_file_appender = tracing_appender::rolling::daily(log_path, "vendor_disclosure.log");
    let (text_writer, text_guard) = tracing_appender::non_blocking(text_file_appender);

    let json_file_appender =
        tracing_appender::rolling::daily(log_path, "vendor_disclosure.json.log");
    let (json_writer, json_guard) = tracing_appender::non_blocking(json_file_appender);

    let text_layer = fmt::layer()
        .with_writer(text_writer)
        .with_target(true)
        .with_line_number(true)
        .with_ansi(false)
        .compact()
        .with_filter(env_filter.clone());

    let json_layer = fmt::layer()
        .json()
        .with_writer(json_writer)
        .with_target(true)
        .with_line_number(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_filter(env_filter.clone());

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(text_layer)
        .with(json_layer)
        .with(stderr_layer)
        .try_init()?;

    // Writers flush on drop; keep them for the life of the process.
    Box::leak(Box::new(text_guard));
    Box::leak(Box::new(json_guard));

    tracing::debug!("Logging initialized in {}", log_path.display());
    Ok(())
}

/// Stderr-only logging, for runs without a log directory
pub fn init_stderr_logging() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact()
                .with_filter(env_filter()?),
        )
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_logging_initialization_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("logs");

        // A subscriber may already be installed by another test; only the
        // directory side effect is checked.
        let _ = init_logging(&log_path);
        assert!(log_path.exists());
    }
}
