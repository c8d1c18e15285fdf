//! Slack incoming-webhook notifier.
//!
//! Each [`NotificationPayload`] becomes one webhook message holding a single
//! attachment: the title links back to the search, the color marks severity
//! and the digest table sits in a markdown field.

use std::time::Duration;

use async_trait::async_trait;
use digest_pipeline::{NotificationPayload, Notifier, PipelineError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, Result, parse_http_url};
use crate::loggly::DEFAULT_TIMEOUT_SECS;

/// Username shown on posted messages unless configured otherwise.
pub const DEFAULT_USERNAME: &str = "logdigest";

/// Configuration for a Slack webhook.
#[derive(Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// The incoming-webhook URL.
    pub webhook_url: String,
    /// Username shown on posted messages.
    pub username: String,
    /// Timeout in seconds for each request.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The webhook URL embeds its secret.
        f.debug_struct("SlackConfig")
            .field("webhook_url", &"<redacted>")
            .field("username", &self.username)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl SlackConfig {
    /// Creates a new webhook configuration.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::MissingCredential` if the URL is empty, or
    /// `ClientError::InvalidUrl` if it does not parse.
    pub fn new(webhook_url: impl Into<String>) -> Result<Self> {
        let webhook_url = webhook_url.into();
        if webhook_url.is_empty() {
            return Err(ClientError::MissingCredential {
                name: "SLACK_WEBHOOK",
            });
        }
        parse_http_url(&webhook_url)?;

        Ok(Self {
            webhook_url,
            username: DEFAULT_USERNAME.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    /// Sets the username.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// The JSON body of an incoming-webhook request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookMessage {
    /// Display name of the poster.
    pub username: String,
    /// Destination channel; omitted to use the webhook's default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Message attachments.
    pub attachments: Vec<Attachment>,
}

/// A message attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Bar color, e.g. `#ff0000`.
    pub color: String,
    /// Attachment title.
    pub title: String,
    /// Link opened by the title.
    pub title_link: String,
    /// Attachment fields.
    pub fields: Vec<AttachmentField>,
    /// Which parts are rendered as markdown.
    pub mrkdwn_in: Vec<String>,
}

/// A field inside an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentField {
    /// Field content.
    pub value: String,
    /// Whether the field is laid out side by side with others.
    pub short: bool,
}

impl WebhookMessage {
    /// Builds the webhook message for a payload.
    #[must_use]
    pub fn from_payload(payload: &NotificationPayload, username: &str) -> Self {
        let channel = (!payload.channel.is_empty()).then(|| payload.channel.clone());

        Self {
            username: username.to_string(),
            channel,
            attachments: vec![Attachment {
                color: payload.color.clone(),
                title: payload.title.clone(),
                title_link: payload.deep_link.clone(),
                fields: vec![AttachmentField {
                    value: payload.body.clone(),
                    short: false,
                }],
                mrkdwn_in: vec!["fields".to_string()],
            }],
        }
    }
}

/// A notifier posting to a Slack incoming webhook.
#[derive(Debug, Clone)]
pub struct SlackWebhook {
    config: SlackConfig,
    http: reqwest::Client,
}

impl SlackWebhook {
    /// Creates a new webhook notifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: SlackConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, http })
    }

    /// Returns the configured username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.config.username
    }
}

#[async_trait]
impl Notifier for SlackWebhook {
    fn name(&self) -> &str {
        "slack"
    }

    async fn send(&self, payload: &NotificationPayload) -> digest_pipeline::Result<()> {
        let message = WebhookMessage::from_payload(payload, &self.config.username);

        let response = self
            .http
            .post(&self.config.webhook_url)
            .json(&message)
            .send()
            .await
            .map_err(|e| PipelineError::send_failed(format!("webhook request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::send_failed(format!(
                "webhook returned status {status}: {body}"
            )));
        }

        debug!(title = %payload.title, channel = ?message.channel, "webhook accepted message");
        Ok(())
    }
}
