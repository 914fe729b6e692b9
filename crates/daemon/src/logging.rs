//! Tracing subscriber setup
//!
//! `RUST_LOG` drives the filter (default `bulkex=info`). Console output is
//! pretty or JSON; when a log directory is configured a daily rolling JSON
//! file is written alongside.

use anyhow::{anyhow, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, Layer, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "bulkex=info,tower_http=info";
const LOG_FILE_PREFIX: &str = "bulkex.log";

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the process or buffered file output is lost.
pub fn init(format: &str, log_dir: Option<&str>) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .map_err(|e| anyhow!("invalid log filter: {}", e))?;

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let console_layer = match format {
        "json" => fmt::layer().json().boxed(),
        _ => fmt::layer().pretty().boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
    .map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))?;

    Ok(guard)
}
