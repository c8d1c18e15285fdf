//! Error types for the digest-pipeline crate.

use thiserror::Error;

/// Errors that can occur while running a digest pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The log-search backend failed (network, auth, HTTP status or decode).
    #[error("backend query failed: {reason}")]
    BackendQuery {
        /// The reason the query failed.
        reason: String,
    },

    /// The messaging backend rejected or failed to receive a payload.
    #[error("notification {index} failed: {reason}")]
    NotificationSend {
        /// Zero-based index of the payload that failed.
        index: usize,
        /// The reason the send failed.
        reason: String,
    },

    /// A search definition is malformed.
    #[error("invalid configuration: {reason}")]
    Configuration {
        /// The reason the configuration is invalid.
        reason: String,
    },
}

impl PipelineError {
    /// Creates a backend query error.
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::BackendQuery {
            reason: reason.into(),
        }
    }

    /// Creates a send error for a single payload.
    ///
    /// The index is filled in by [`crate::notifier::send_all`].
    pub fn send_failed(reason: impl Into<String>) -> Self {
        Self::NotificationSend {
            index: 0,
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Returns true if this error came from the search backend.
    #[must_use]
    pub const fn is_backend(&self) -> bool {
        matches!(self, Self::BackendQuery { .. })
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::BackendQuery {
            reason: format!("malformed response: {err}"),
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
