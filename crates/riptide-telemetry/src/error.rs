//! Failures raised while installing logging or exposing sync metrics.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use prometheus::Error as PrometheusError;
use tracing_subscriber::util::TryInitError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised by the logging and metrics helpers.
#[derive(Debug)]
pub enum TelemetryError {
    /// Another global subscriber already owns the process.
    LoggingInstall {
        /// Error returned by the subscriber registry.
        source: TryInitError,
    },
    /// A sync collector rejected its options.
    CollectorBuild {
        /// Name of the sync metric.
        metric: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// A sync collector clashed with one already in the registry.
    CollectorRegister {
        /// Name of the sync metric.
        metric: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// Gathered metric families could not be written as text exposition.
    Exposition {
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// The text exposition buffer held invalid UTF-8.
    ExpositionUtf8 {
        /// Underlying conversion error.
        source: std::string::FromUtf8Error,
    },
}

impl Display for TelemetryError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoggingInstall { .. } => formatter.write_str("logging already initialised"),
            Self::CollectorBuild { metric, .. } => {
                write!(formatter, "invalid collector options for '{metric}'")
            }
            Self::CollectorRegister { metric, .. } => {
                write!(formatter, "collector '{metric}' already registered")
            }
            Self::Exposition { .. } => formatter.write_str("failed to render sync metrics"),
            Self::ExpositionUtf8 { .. } => {
                formatter.write_str("rendered sync metrics were not utf-8")
            }
        }
    }
}

impl Error for TelemetryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::LoggingInstall { source } => Some(source),
            Self::CollectorBuild { source, .. }
            | Self::CollectorRegister { source, .. }
            | Self::Exposition { source } => Some(source),
            Self::ExpositionUtf8 { source } => Some(source),
        }
    }
}
