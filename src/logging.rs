// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Log subscriber setup.
//!
//! The level comes from `RUST_LOG`, `info` when unset. `LOG_FORMAT=json`
//! switches from human readable output to one JSON object per line.

use crate::errors::LoggingError;
use tracing::Subscriber;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<LogFormat> {
        match s.to_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "pretty" => Some(LogFormat::Pretty),
            _ => None,
        }
    }

    /// Reads `LOG_FORMAT`, falling back to pretty output.
    pub fn from_env() -> LogFormat {
        std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|v| LogFormat::parse(&v))
            .unwrap_or_default()
    }
}

/// Installs the global subscriber writing to stdout. Fails when one is
/// already installed.
pub fn init_logging(format: LogFormat) -> Result<(), LoggingError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    subscriber(format, filter, std::io::stdout)
        .try_init()
        .map_err(|e| LoggingError(e.to_string()))
}

/// Builds the subscriber without installing it.
///
/// # Parameters
///
/// * `format` - pretty lines or one flattened JSON object per event
/// * `filter` - level directives, usually taken from `RUST_LOG`
/// * `writer` - where formatted events go
pub fn subscriber<W>(
    format: LogFormat,
    filter: EnvFilter,
    writer: W,
) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let registry = tracing_subscriber::registry();

    match format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_current_span(true)
                .with_span_list(false)
                .flatten_event(true)
                .with_filter(filter);

            Box::new(registry.with(layer))
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_line_number(true)
                .with_filter(filter);

            Box::new(registry.with(layer))
        }
    }
}
