//! Logging setup.
//!
//! Console output always, plus a daily rolling file when a log directory is
//! configured. Timestamps use the local timezone.

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::Writer, time::FormatTime},
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

pub use crate::config::DEFAULT_LOG_FILTER;

const LOG_FILE_PREFIX: &str = "live-notify.log";

type BoxedLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

/// Formats timestamps in the local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Build the filter: `RUST_LOG` first, then the configured directives.
pub fn build_filter(directives: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(directives)
            .map_err(|e| Error::config(format!("invalid log filter {directives:?}: {e}"))),
    }
}

/// Install the global subscriber.
///
/// Returns the file writer guard when file logging is enabled; keep it alive
/// until shutdown so buffered lines are flushed.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(&config.filter)?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if config.json {
        layers.push(fmt::layer().json().with_timer(LocalTimer).boxed());
    } else {
        layers.push(fmt::layer().with_ansi(true).with_timer(LocalTimer).boxed());
    }

    let guard = match &config.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            if config.json {
                layers.push(
                    fmt::layer()
                        .json()
                        .with_writer(non_blocking)
                        .with_timer(LocalTimer)
                        .boxed(),
                );
            } else {
                layers.push(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_timer(LocalTimer)
                        .boxed(),
                );
            }
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to set global default subscriber: {e}")))?;

    Ok(guard)
}
