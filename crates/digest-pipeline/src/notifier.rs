//! Notifiers for digest delivery.
//!
//! This module provides the [`Notifier`] trait, the [`send_all`] delivery
//! loop and a [`LogNotifier`] that writes payloads to the tracing log instead
//! of a messaging backend.

use std::fmt;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::types::NotificationPayload;

/// Trait for messaging backends.
///
/// Sends are not assumed to be idempotent, so the pipeline never retries
/// them.
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Returns the name of this notifier.
    fn name(&self) -> &str;

    /// Sends one payload.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::NotificationSend` if the backend rejects or
    /// does not receive the payload.
    async fn send(&self, payload: &NotificationPayload) -> Result<()>;
}

/// Sends `payloads` in order, stopping at the first failure.
///
/// Returns the number of payloads delivered. Payloads sent before a failure
/// stay delivered.
///
/// # Errors
///
/// Returns `PipelineError::NotificationSend` carrying the index of the
/// payload that failed.
pub async fn send_all(notifier: &dyn Notifier, payloads: &[NotificationPayload]) -> Result<usize> {
    for (index, payload) in payloads.iter().enumerate() {
        if let Err(e) = notifier.send(payload).await {
            let reason = match e {
                PipelineError::NotificationSend { reason, .. } => reason,
                other => other.to_string(),
            };
            return Err(PipelineError::NotificationSend { index, reason });
        }
        debug!(
            notifier = %notifier.name(),
            index,
            of = payloads.len(),
            "payload sent"
        );
    }

    Ok(payloads.len())
}

/// A notifier that logs payloads, for dry runs.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    name: String,
}

impl LogNotifier {
    /// Creates a new log notifier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new("log")
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, payload: &NotificationPayload) -> Result<()> {
        info!(
            title = %payload.title,
            channel = %payload.channel,
            link = %payload.deep_link,
            "DIGEST\n{}",
            payload.text
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn payload(text: &str) -> NotificationPayload {
        NotificationPayload {
            title: "Errors 3".to_string(),
            body: format!("```\n{text}```"),
            text: text.to_string(),
            color: "#ff0000".to_string(),
            deep_link: "https://acme.loggly.com/search#terms=x".to_string(),
            channel: String::new(),
        }
    }

    /// Records sent payloads, failing on the configured call.
    #[derive(Debug, Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, payload: &NotificationPayload) -> Result<()> {
            let mut sent = self
                .sent
                .lock()
                .map_err(|_| PipelineError::send_failed("mutex poisoned"))?;
            if self.fail_on == Some(sent.len()) {
                return Err(PipelineError::send_failed("status 500"));
            }
            sent.push(payload.text.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn sends_all_in_order() {
        let notifier = RecordingNotifier::default();
        let payloads = vec![payload("one"), payload("two"), payload("three")];

        let sent = send_all(&notifier, &payloads).await.unwrap();

        assert_eq!(sent, 3);
        assert_eq!(*notifier.sent.lock().unwrap(), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn stops_at_first_failure() {
        let notifier = RecordingNotifier {
            fail_on: Some(1),
            ..Default::default()
        };
        let payloads = vec![payload("one"), payload("two"), payload("three")];

        let err = send_all(&notifier, &payloads).await.unwrap_err();

        match err {
            PipelineError::NotificationSend { index, reason } => {
                assert_eq!(index, 1);
                assert_eq!(reason, "status 500");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*notifier.sent.lock().unwrap(), vec!["one"]);
    }

    #[tokio::test]
    async fn empty_payload_list() {
        let notifier = RecordingNotifier::default();
        assert_eq!(send_all(&notifier, &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let notifier = LogNotifier::default();
        assert_eq!(notifier.name(), "log");
        assert_eq!(send_all(&notifier, &[payload("a 1")]).await.unwrap(), 1);
    }
}
