// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Console and optional file logging for the `weave` binary.
//!
//! Reduced from the shape of a server's multi-layer telemetry setup: no
//! OpenTelemetry exporter and no `tokio-console` layer, just `tracing`'s
//! own `fmt` layers gated by an [`EnvFilter`].

use std::path::Path;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type DynLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Console/file logging knobs, populated straight from CLI flags — the
/// runner has no long-lived server config to hang this off.
pub struct LogConfig<'a> {
    pub console_level: &'a str,
    pub file_path: Option<&'a Path>,
}

fn env_filter_or_level(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn make_console_layer(level: &str) -> DynLayer {
    tracing_subscriber::fmt::layer().with_filter(env_filter_or_level(level)).boxed()
}

fn make_file_layer(non_blocking: tracing_appender::non_blocking::NonBlocking, level: &str) -> DynLayer {
    tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(env_filter_or_level(level))
        .boxed()
}

/// Installs the global subscriber. The returned guard must be held for the
/// lifetime of the process when file logging is enabled — dropping it
/// flushes the non-blocking writer.
///
/// # Errors
///
/// Returns an error if the log file's path has no file name component.
pub fn init_logging(
    config: &LogConfig<'_>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, Box<dyn std::error::Error>> {
    let mut layers = vec![make_console_layer(config.console_level)];

    let guard = match config.file_path {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
            let file_name = path.file_name().ok_or("log file path has no file name")?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            layers.push(make_file_layer(non_blocking, config.console_level));
            Some(guard)
        },
        None => None,
    };

    tracing_subscriber::registry().with(layers).init();
    Ok(guard)
}
