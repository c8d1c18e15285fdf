//! Loggly search API client.
//!
//! A query takes two requests: `apiv2/search` registers the search and
//! returns a result-set id, then `apiv2/events` returns the matching events
//! for that id. Every event is decoded into a [`LogEvent`] before it reaches
//! the pipeline; a record that does not decode fails the whole fetch.

use std::time::Duration;

use async_trait::async_trait;
use digest_pipeline::{EventFetcher, LogEvent, PipelineError, TimeWindow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, Result, parse_http_url};

/// Default timeout for backend requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for a Loggly account.
#[derive(Clone, Serialize, Deserialize)]
pub struct LogglyConfig {
    /// Account subdomain.
    pub account: String,
    /// API token.
    pub token: String,
    /// API base URL; defaults to `https://<account>.loggly.com`.
    pub base_url: Option<String>,
    /// Timeout in seconds for each request.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for LogglyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogglyConfig")
            .field("account", &self.account)
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl LogglyConfig {
    /// Creates a new configuration.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::MissingCredential` if the account or token is empty.
    pub fn new(account: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let account = account.into();
        let token = token.into();
        if account.is_empty() {
            return Err(ClientError::MissingCredential {
                name: "LOGGLY_ACCOUNT",
            });
        }
        if token.is_empty() {
            return Err(ClientError::MissingCredential {
                name: "LOGGLY_TOKEN",
            });
        }

        Ok(Self {
            account,
            token,
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Returns the API base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        self.base_url.as_ref().map_or_else(
            || format!("https://{}.loggly.com", self.account),
            |url| url.trim_end_matches('/').to_string(),
        )
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    rsid: ResultSetId,
}

#[derive(Debug, Deserialize)]
struct ResultSetId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    total_events: Option<u64>,
    #[serde(default)]
    events: Vec<RawEvent>,
}

/// An event as returned by the events endpoint.
#[derive(Debug, Deserialize)]
struct RawEvent {
    logmsg: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

/// The JSON body logged by the application.
#[derive(Debug, Default, Deserialize)]
struct LogMessage {
    #[serde(default, alias = "Msg")]
    msg: Option<String>,
}

/// Decodes one raw event.
fn decode_event(raw: RawEvent) -> digest_pipeline::Result<LogEvent> {
    let logmsg = raw
        .logmsg
        .ok_or_else(|| PipelineError::backend("event without logmsg"))?;
    let body: LogMessage = serde_json::from_str(&logmsg).map_err(|e| {
        PipelineError::backend(format!("undecodable logmsg: {e}"))
    })?;

    Ok(LogEvent {
        message: body.msg.unwrap_or_default(),
        tags: raw.tags,
    })
}

/// Client for the Loggly search API.
#[derive(Debug, Clone)]
pub struct LogglyClient {
    config: LogglyConfig,
    base_url: String,
    http: reqwest::Client,
}

impl LogglyClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: LogglyConfig) -> Result<Self> {
        let base_url = config.base_url();
        parse_http_url(&base_url)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            base_url,
            http,
        })
    }

    /// Returns the account name.
    #[must_use]
    pub fn account(&self) -> &str {
        &self.config.account
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> digest_pipeline::Result<T> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.token)
            .query(params)
            .send()
            .await
            .map_err(|e| PipelineError::backend(format!("request to {path} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::backend(format!(
                "{path} returned status {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::backend(format!("reading {path} response failed: {e}")))?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Registers a search and returns its result-set id.
    async fn start_search(
        &self,
        query: &str,
        window: &TimeWindow,
        max_results: usize,
    ) -> digest_pipeline::Result<String> {
        let params = [
            ("q", query.to_string()),
            ("from", window.start_rfc3339()),
            ("until", window.end_rfc3339()),
            ("size", max_results.to_string()),
        ];
        let response: SearchResponse = self.get_json("apiv2/search", &params).await?;
        Ok(response.rsid.id)
    }
}

#[async_trait]
impl EventFetcher for LogglyClient {
    fn name(&self) -> &str {
        "loggly"
    }

    async fn fetch(
        &self,
        query: &str,
        window: &TimeWindow,
        max_results: usize,
    ) -> digest_pipeline::Result<Vec<LogEvent>> {
        let rsid = self.start_search(query, window, max_results).await?;
        debug!(rsid = %rsid, "search registered");

        let response: EventsResponse = self
            .get_json("apiv2/events", &[("rsid", rsid)])
            .await?;
        debug!(
            returned = response.events.len(),
            total_events = ?response.total_events,
            "events received"
        );

        response
            .events
            .into_iter()
            .take(max_results)
            .map(decode_event)
            .collect()
    }
}
