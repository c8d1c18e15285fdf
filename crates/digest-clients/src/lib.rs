//! # digest-clients
//!
//! Backend clients for logdigest.
//!
//! This crate provides:
//!
//! - [`LogglyClient`] — [`EventFetcher`](digest_pipeline::EventFetcher) over the Loggly search API
//! - [`SlackWebhook`] — [`Notifier`](digest_pipeline::Notifier) posting to a Slack incoming webhook
//! - [`ClientError`] — Configuration errors for both
//!
//! ## Example
//!
//! ```rust,no_run
//! use digest_clients::{LogglyClient, LogglyConfig, SlackConfig, SlackWebhook};
//!
//! # fn main() -> Result<(), digest_clients::ClientError> {
//! let loggly = LogglyClient::new(LogglyConfig::new("acme", "token")?)?;
//! let slack = SlackWebhook::new(
//!     SlackConfig::new("https://hooks.slack.com/services/T/B/X")?.with_username("digest-bot"),
//! )?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod loggly;
pub mod slack;

pub use error::{ClientError, Result};
pub use loggly::{DEFAULT_TIMEOUT_SECS, LogglyClient, LogglyConfig};
pub use slack::{
    Attachment, AttachmentField, DEFAULT_USERNAME, SlackConfig, SlackWebhook, WebhookMessage,
};
