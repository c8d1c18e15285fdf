//! Error types for the digest daemon.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading configuration or wiring the daemon.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file '{}': {source}", path.display())]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for the expected shape.
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A search entry is inconsistent.
    #[error("search '{search}': {reason}")]
    InvalidSearch {
        /// Name of the search.
        search: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A top-level setting is invalid.
    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    /// A credential is missing or malformed.
    #[error(transparent)]
    Client(#[from] digest_clients::ClientError),

    /// A search was rejected by the pipeline.
    #[error(transparent)]
    Pipeline(#[from] digest_pipeline::PipelineError),
}

impl ConfigError {
    pub(crate) fn search(search: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSearch {
            search: search.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for daemon setup.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_invalid_search() {
        let err = ConfigError::search("daily_digest", "daily entries need a time");
        assert_eq!(
            err.to_string(),
            "search 'daily_digest': daily entries need a time"
        );
    }

    #[test]
    fn error_display_io() {
        let err = ConfigError::Io {
            path: PathBuf::from("/nope/searches.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(
            err.to_string(),
            "failed to read config file '/nope/searches.toml': not found"
        );
    }

    #[test]
    fn error_from_client_is_transparent() {
        let err: ConfigError = digest_clients::ClientError::MissingCredential {
            name: "LOGGLY_TOKEN",
        }
        .into();
        assert_eq!(err.to_string(), "missing credential: LOGGLY_TOKEN");
    }
}
