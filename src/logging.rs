//! Structured logging initialization.
//!
//! The RUST_LOG environment variable takes precedence over the configured
//! level.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::layer::Layered;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

type Filtered = Layered<EnvFilter, Registry>;

/// Initialize the logging subsystem.
///
/// # Example
///
/// ```ignore
/// use router::config::LoggingConfig;
///
/// router::logging::init(&LoggingConfig::default());
/// tracing::info!("Router starting");
/// ```
pub fn init(config: &LoggingConfig) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(config.level.as_str())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output_layer(config))
        .init();
}

fn output_layer(config: &LoggingConfig) -> Box<dyn Layer<Filtered> + Send + Sync> {
    let layer = fmt::layer()
        .with_target(config.target)
        .with_thread_names(config.thread_names);

    match (config.format, config.timestamps) {
        (LogFormat::Pretty, true) => layer.with_ansi(true).boxed(),
        (LogFormat::Pretty, false) => layer.with_ansi(true).without_time().boxed(),
        (LogFormat::Compact, true) => layer.compact().with_ansi(true).boxed(),
        (LogFormat::Compact, false) => layer.compact().with_ansi(true).without_time().boxed(),
        (LogFormat::Json, true) => layer.json().boxed(),
        (LogFormat::Json, false) => layer.json().without_time().boxed(),
    }
}
