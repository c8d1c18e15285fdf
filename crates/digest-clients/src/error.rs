//! Error types for the digest-clients crate.

use thiserror::Error;

/// Errors raised while configuring a backend client.
///
/// Request-time failures are reported as
/// [`digest_pipeline::PipelineError`] so the pipeline can tell query
/// failures from send failures.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A required credential is empty.
    #[error("missing credential: {name}")]
    MissingCredential {
        /// Name of the missing credential.
        name: &'static str,
    },

    /// A configured URL does not parse.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The HTTP client could not be built.
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type for client configuration.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Parses `url`, accepting only `http` and `https` schemes.
pub(crate) fn parse_http_url(url: &str) -> Result<url::Url> {
    let parsed = url::Url::parse(url).map_err(|e| ClientError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ClientError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}
