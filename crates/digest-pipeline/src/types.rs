//! Core types for the digest pipeline.
//!
//! This module provides the fundamental types used throughout the crate:
//! - [`Schedule`]: When a search runs
//! - [`SearchSpec`]: One configured recurring search
//! - [`TimeWindow`]: The UTC interval a run queries
//! - [`LogEvent`]: A decoded event from the log-search backend
//! - [`SummaryEntry`] and [`EnvGroup`]: Summarizer output
//! - [`NotificationPayload`]: One transport-sized message

use std::fmt;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::summarizer::environment_from_tags;

/// When a search is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    /// Once a day at the given UTC time of day.
    Daily {
        /// Time of day the search runs.
        at: NaiveTime,
    },
    /// Every `minutes` minutes.
    Interval {
        /// Minutes between runs.
        minutes: u64,
    },
}

impl Schedule {
    /// Creates a daily schedule.
    #[must_use]
    pub const fn daily(at: NaiveTime) -> Self {
        Self::Daily { at }
    }

    /// Creates a fixed-interval schedule.
    #[must_use]
    pub const fn every_minutes(minutes: u64) -> Self {
        Self::Interval { minutes }
    }

    /// Returns true for daily schedules.
    #[must_use]
    pub const fn is_daily(&self) -> bool {
        matches!(self, Self::Daily { .. })
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily { at } => write!(f, "daily at {}", at.format("%H:%M")),
            Self::Interval { minutes } => write!(f, "every {minutes} minutes"),
        }
    }
}

/// One configured recurring search.
///
/// Immutable once built. Shared read-only between the scheduler and every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSpec {
    /// Configuration key identifying the search.
    pub name: String,
    /// Free-text query sent to the log-search backend.
    pub query: String,
    /// Title used in notifications.
    pub title: String,
    /// Destination channel; empty means the webhook's default.
    pub channel: String,
    /// Length of the query window in minutes.
    pub window_minutes: u32,
    /// Minimum number of events before a notification is sent.
    pub threshold: usize,
    /// When the search runs.
    pub schedule: Schedule,
    /// Whether events are grouped by their `-syslog` environment tag.
    pub group_by_environment: bool,
}

impl SearchSpec {
    /// Creates a new search builder.
    pub fn builder(
        name: impl Into<String>,
        query: impl Into<String>,
        title: impl Into<String>,
    ) -> SearchSpecBuilder {
        SearchSpecBuilder::new(name, query, title)
    }

    /// Returns the window that ends at `now`.
    #[must_use]
    pub fn window_ending_at(&self, now: DateTime<Utc>) -> TimeWindow {
        TimeWindow::ending_at(now, self.window_minutes)
    }
}

/// Builder for creating [`SearchSpec`] instances.
#[derive(Debug)]
pub struct SearchSpecBuilder {
    name: String,
    query: String,
    title: String,
    channel: String,
    window_minutes: u32,
    threshold: usize,
    schedule: Schedule,
    group_by_environment: bool,
}

impl SearchSpecBuilder {
    fn new(name: impl Into<String>, query: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            title: title.into(),
            channel: String::new(),
            window_minutes: 60,
            threshold: 1,
            schedule: Schedule::every_minutes(60),
            group_by_environment: false,
        }
    }

    /// Sets the destination channel.
    #[must_use]
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Sets the window length in minutes.
    #[must_use]
    pub const fn window_minutes(mut self, minutes: u32) -> Self {
        self.window_minutes = minutes;
        self
    }

    /// Sets the notification threshold.
    #[must_use]
    pub const fn threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the schedule.
    #[must_use]
    pub const fn schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Enables grouping by environment tag.
    #[must_use]
    pub const fn group_by_environment(mut self, enabled: bool) -> Self {
        self.group_by_environment = enabled;
        self
    }

    /// Builds the [`SearchSpec`].
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Configuration` if:
    /// - The name, query or title is empty
    /// - The window is zero minutes
    /// - An interval schedule has zero minutes
    pub fn build(self) -> Result<SearchSpec> {
        if self.name.is_empty() {
            return Err(PipelineError::configuration("search name cannot be empty"));
        }
        if self.query.trim().is_empty() {
            return Err(PipelineError::configuration(format!(
                "search '{}' has an empty query",
                self.name
            )));
        }
        if self.title.is_empty() {
            return Err(PipelineError::configuration(format!(
                "search '{}' has an empty title",
                self.name
            )));
        }
        if self.window_minutes == 0 {
            return Err(PipelineError::configuration(format!(
                "search '{}' needs a window of at least one minute",
                self.name
            )));
        }
        if let Schedule::Interval { minutes: 0 } = self.schedule {
            return Err(PipelineError::configuration(format!(
                "search '{}' has a zero-minute interval",
                self.name
            )));
        }

        Ok(SearchSpec {
            name: self.name,
            query: self.query,
            title: self.title,
            channel: self.channel,
            window_minutes: self.window_minutes,
            threshold: self.threshold,
            schedule: self.schedule,
            group_by_environment: self.group_by_environment,
        })
    }
}

/// A UTC time interval `[start, end]` covered by one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (inclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates the window of `minutes` minutes ending at `end`.
    #[must_use]
    pub fn ending_at(end: DateTime<Utc>, minutes: u32) -> Self {
        Self {
            start: end - Duration::minutes(i64::from(minutes)),
            end,
        }
    }

    /// Returns the length of the window.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Returns the start as an RFC 3339 string.
    #[must_use]
    pub fn start_rfc3339(&self) -> String {
        self.start.to_rfc3339()
    }

    /// Returns the end as an RFC 3339 string.
    #[must_use]
    pub fn end_rfc3339(&self) -> String {
        self.end.to_rfc3339()
    }
}

/// A log event decoded at the fetcher boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// The event's message text.
    pub message: String,
    /// Tags attached to the event by the backend.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl LogEvent {
    /// Creates an untagged event.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            tags: Vec::new(),
        }
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Returns the environment derived from the `-syslog` tag, or `""`.
    #[must_use]
    pub fn environment(&self) -> &str {
        environment_from_tags(&self.tags)
    }
}

/// One row of a summary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SummaryEntry {
    /// Message text, or `environment.message` when grouped by environment.
    pub key: String,
    /// Number of events with this key.
    pub count: usize,
}

impl SummaryEntry {
    /// Creates a new entry.
    pub fn new(key: impl Into<String>, count: usize) -> Self {
        Self {
            key: key.into(),
            count,
        }
    }
}

/// The summary of one environment's events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvGroup {
    /// Environment name, empty for untagged events.
    pub environment: String,
    /// Rendered table of this environment's messages.
    pub rendered_table: String,
    /// Number of events in this environment.
    pub total: usize,
}

/// One message ready for the messaging backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Attachment title.
    pub title: String,
    /// Message body, wrapped in a monospace block.
    pub body: String,
    /// The raw lines of this chunk, without the monospace wrapper.
    pub text: String,
    /// Color marker for the attachment.
    pub color: String,
    /// Link back to the search in the backend's UI.
    pub deep_link: String,
    /// Destination channel; empty means the webhook's default.
    pub channel: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> SearchSpecBuilder {
        SearchSpec::builder("api_errors", "level:error", "API errors")
    }

    mod schedule_tests {
        use super::*;

        #[test]
        fn schedule_display() {
            let at = NaiveTime::from_hms_opt(9, 5, 0).unwrap();
            assert_eq!(Schedule::daily(at).to_string(), "daily at 09:05");
            assert_eq!(Schedule::every_minutes(30).to_string(), "every 30 minutes");
        }

        #[test]
        fn schedule_is_daily() {
            let at = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
            assert!(Schedule::daily(at).is_daily());
            assert!(!Schedule::every_minutes(5).is_daily());
        }
    }

    mod search_spec_tests {
        use super::*;
        use test_case::test_case;

        #[test]
        fn build_with_defaults() {
            let spec = spec().build().unwrap();
            assert_eq!(spec.name, "api_errors");
            assert_eq!(spec.window_minutes, 60);
            assert_eq!(spec.threshold, 1);
            assert!(spec.channel.is_empty());
            assert!(!spec.group_by_environment);
        }

        #[test]
        fn build_with_all_fields() {
            let spec = spec()
                .channel("#alerts")
                .window_minutes(30)
                .threshold(0)
                .schedule(Schedule::every_minutes(15))
                .group_by_environment(true)
                .build()
                .unwrap();

            assert_eq!(spec.channel, "#alerts");
            assert_eq!(spec.window_minutes, 30);
            assert_eq!(spec.threshold, 0);
            assert_eq!(spec.schedule, Schedule::every_minutes(15));
            assert!(spec.group_by_environment);
        }

        #[test_case("", "q", "t" ; "empty name")]
        #[test_case("n", "", "t" ; "empty query")]
        #[test_case("n", "   ", "t" ; "blank query")]
        #[test_case("n", "q", "" ; "empty title")]
        fn build_rejects_missing_fields(name: &str, query: &str, title: &str) {
            let result = SearchSpec::builder(name, query, title).build();
            assert!(matches!(result, Err(PipelineError::Configuration { .. })));
        }

        #[test]
        fn build_rejects_zero_window() {
            let result = spec().window_minutes(0).build();
            assert!(matches!(result, Err(PipelineError::Configuration { .. })));
        }

        #[test]
        fn build_rejects_zero_interval() {
            let result = spec().schedule(Schedule::every_minutes(0)).build();
            assert!(matches!(result, Err(PipelineError::Configuration { .. })));
        }

        #[test]
        fn window_ending_at_spans_window_minutes() {
            let spec = spec().window_minutes(30).build().unwrap();
            let now = Utc::now();
            let window = spec.window_ending_at(now);

            assert_eq!(window.end, now);
            assert_eq!(window.duration(), Duration::minutes(30));
        }
    }

    mod event_tests {
        use super::*;

        #[test]
        fn environment_from_syslog_tag() {
            let event = LogEvent::new("boom")
                .with_tag("api")
                .with_tag("production-syslog");
            assert_eq!(event.environment(), "production");
        }

        #[test]
        fn environment_empty_without_tag() {
            let event = LogEvent::new("boom").with_tag("api");
            assert_eq!(event.environment(), "");
        }

        #[test]
        fn event_deserializes_without_tags() {
            let event: LogEvent = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
            assert_eq!(event, LogEvent::new("hi"));
        }
    }

    #[test]
    fn window_rfc3339_strings() {
        let end = DateTime::parse_from_rfc3339("2024-05-01T10:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let window = TimeWindow::ending_at(end, 30);

        assert_eq!(window.start_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert_eq!(window.end_rfc3339(), "2024-05-01T10:30:00+00:00");
    }
}
