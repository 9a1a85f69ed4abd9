//! Tracing setup for the binary.
//!
//! Events go to stderr and, when a log directory is configured, to a daily
//! rolling file `dataprep.<date>.log`. Session work runs inside a `session`
//! span, so file lines carry the session id.

use std::path::Path;

use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::AppConfig;
use crate::error::{ConfigError, ConfigResult};

pub const LOG_FILE_PREFIX: &str = "dataprep";

/// Daily rolling appender keeping at most `max_files` files in `dir`.
pub fn file_appender(dir: &Path, max_files: usize) -> ConfigResult<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(max_files)
        .build(dir)
        .map_err(|e| ConfigError::Logging(format!("{}: {}", dir.display(), e)))
}

/// Plain-text layer for a log file.
pub fn file_layer<S, W>(writer: W, filter: &str) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(EnvFilter::new(filter))
        .boxed()
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for
/// the life of the process.
pub fn init_logging(config: &AppConfig) -> ConfigResult<Option<WorkerGuard>> {
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(&config.log_filter));

    let (file, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = file_appender(dir, config.log_max_files)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(file_layer(writer, &config.log_filter)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    if let Some(dir) = &config.log_dir {
        tracing::debug!(dir = %dir.display(), "Logging to file");
    }
    Ok(guard)
}
