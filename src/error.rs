//! Error types returned by the metrics runtime.

use thiserror::Error;

/// Errors raised by the registry/factory/collector object graph.
///
/// A cancellation signal is deliberately absent: it is the pusher loop's
/// internal, benign exit condition and is never surfaced as an `Err`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetricsError {
    /// A metric name, label name, or generator argument failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `get_or_add` found an existing family with the same name but a
    /// different kind or label schema.
    #[error("{0}")]
    SchemaConflict(String),

    /// An operation was attempted in a state that forbids it (e.g. setting
    /// static labels after the first collection).
    #[error("state violation: {0}")]
    StateViolation(String),

    /// A registered `before_collect` callback could not produce its values.
    #[error("scrape failed: {0}")]
    ScrapeFailure(String),

    /// The pusher could not deliver the exposition to the Pushgateway.
    #[error("push failed: {0}")]
    TransportFailure(String),
}

impl MetricsError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MetricsError>;
