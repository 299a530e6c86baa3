//! Tracing subscriber setup: stdout plus optional rotating file output.

use crate::config::{Config, LogRotation};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initializes the global tracing subscriber. The returned [`WorkerGuard`]
/// must be kept alive for the process lifetime, or buffered file writes
/// are lost on drop.
pub fn init(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);

    if !config.logging.file_enabled {
        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .init();
        return None;
    }

    let rotation = match config.logging.file_rotation {
        LogRotation::Hourly => tracing_appender::rolling::Rotation::HOURLY,
        LogRotation::Daily => tracing_appender::rolling::Rotation::DAILY,
        LogRotation::Never => tracing_appender::rolling::Rotation::NEVER,
    };
    let file_appender = tracing_appender::rolling::RollingFileAppender::new(
        rotation,
        &config.logging.file_dir,
        &config.logging.file_prefix,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Some(guard)
}
