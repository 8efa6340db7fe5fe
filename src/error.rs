//! Error types for sampling, reporting and notification

use std::fmt;

/// Result type alias for monitoring operations
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Errors that can occur while monitoring
///
/// None of these is fatal to a running agent or collector. Startup
/// configuration errors are reported through `anyhow` instead.
#[derive(Debug)]
pub enum MonitorError {
    /// A metrics source call failed; the affected field degrades to zero
    MetricsUnavailable(String),

    /// The configured network interface is absent from the counter list
    InterfaceNotFound(String),

    /// Aggregate mode found no physical interface to sum
    NoUsableInterface,

    /// Sending a report to the collector failed
    TransportFailure(String),

    /// The report carried a wrong shared secret
    AuthenticationFailure,

    /// The incoming payload could not be decoded
    DecodeFailure(String),

    /// Delivering a notification failed
    NotifierFailure(String),

    /// No notifier is configured on this collector
    NotifierNotConfigured,
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::MetricsUnavailable(msg) => write!(f, "metrics unavailable: {}", msg),
            MonitorError::InterfaceNotFound(name) => {
                write!(f, "network interface '{}' not found", name)
            }
            MonitorError::NoUsableInterface => write!(f, "no usable physical network interface"),
            MonitorError::TransportFailure(msg) => write!(f, "report delivery failed: {}", msg),
            MonitorError::AuthenticationFailure => write!(f, "authentication failed"),
            MonitorError::DecodeFailure(msg) => write!(f, "malformed payload: {}", msg),
            MonitorError::NotifierFailure(msg) => write!(f, "notification failed: {}", msg),
            MonitorError::NotifierNotConfigured => write!(f, "no notifier configured"),
        }
    }
}

impl std::error::Error for MonitorError {}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        MonitorError::TransportFailure(err.to_string())
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::DecodeFailure(err.to_string())
    }
}
