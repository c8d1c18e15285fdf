//! Job runner executing one search end to end.
//!
//! This module provides the [`JobRunner`], the entry point invoked on every
//! scheduled trigger. A run computes its window, fetches events (retrying the
//! query once), summarizes them, applies the threshold gate, formats the
//! payloads and sends them. Failures end the run, never the process.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::fetcher::{DEFAULT_MAX_RESULTS, EventFetcher};
use crate::formatter::NotificationFormatter;
use crate::gate::{NO_RESULTS, notification_body, should_notify};
use crate::notifier::{Notifier, send_all};
use crate::retry::retry_once;
use crate::schedule::{Job, JobFuture};
use crate::summarizer::{
    Summary, summarize, summarize_by_environment, summarize_keyed_by_environment,
};
use crate::types::{EnvGroup, LogEvent, NotificationPayload, SearchSpec, SummaryEntry, TimeWindow};

/// Configuration for the job runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Maximum events requested per query.
    pub max_results: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

/// The stage a run is in, or ended in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Not started.
    Idle,
    /// Querying the backend.
    Fetching,
    /// Grouping fetched events.
    Summarizing,
    /// Applying the threshold gate.
    Deciding,
    /// Finished below the threshold.
    NotSent,
    /// Building payloads.
    Formatting,
    /// Delivering payloads.
    Sending,
    /// Finished with every payload delivered.
    Sent,
    /// Finished after a fetch or send failure.
    Failed,
}

impl RunState {
    /// Returns the state as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Summarizing => "summarizing",
            Self::Deciding => "deciding",
            Self::NotSent => "not_sent",
            Self::Formatting => "formatting",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    /// Returns true for states a run ends in.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::NotSent | Self::Sent | Self::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The outcome of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Identifier of this run, also attached to its log span.
    pub run_id: Uuid,
    /// Name of the search.
    pub search: String,
    /// Final state.
    pub state: RunState,
    /// Every state entered, in order, starting with [`RunState::Idle`].
    pub states: Vec<RunState>,
    /// The queried window.
    pub window: TimeWindow,
    /// Number of backend queries made.
    pub fetch_attempts: u32,
    /// Number of events fetched.
    pub total: usize,
    /// Counts per key; keys are `environment.message` for grouped searches.
    pub entries: Vec<SummaryEntry>,
    /// Number of payloads delivered.
    pub payloads_sent: usize,
    /// Error description for failed runs.
    pub error: Option<String>,
}

impl RunReport {
    fn new(spec: &SearchSpec, window: TimeWindow) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            search: spec.name.clone(),
            state: RunState::Idle,
            states: vec![RunState::Idle],
            window,
            fetch_attempts: 0,
            total: 0,
            entries: Vec::new(),
            payloads_sent: 0,
            error: None,
        }
    }

    /// Returns true unless the run failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state != RunState::Failed
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = %self.state, to = %next, "run state");
        self.state = next;
        self.states.push(next);
    }

    fn fail(&mut self, reason: String) {
        self.transition(RunState::Failed);
        self.error = Some(reason);
    }
}

/// Summarized events, flat or per environment.
///
/// The grouped variant keeps the `environment.message` summary alongside the
/// per-environment tables.
#[derive(Debug)]
enum Digest {
    Flat(Summary),
    ByEnvironment { groups: Vec<EnvGroup>, keyed: Summary },
}

impl Digest {
    fn summarize(events: &[LogEvent], group_by_environment: bool) -> Self {
        if group_by_environment {
            let (groups, _) = summarize_by_environment(events);
            Self::ByEnvironment {
                groups,
                keyed: summarize_keyed_by_environment(events),
            }
        } else {
            Self::Flat(summarize(events))
        }
    }

    const fn summary(&self) -> &Summary {
        match self {
            Self::Flat(summary) | Self::ByEnvironment { keyed: summary, .. } => summary,
        }
    }
}

/// Runs searches through the fetch, summarize, gate, format and send stages.
#[derive(Debug)]
pub struct JobRunner {
    config: RunnerConfig,
    fetcher: Arc<dyn EventFetcher>,
    notifier: Arc<dyn Notifier>,
    formatter: NotificationFormatter,
}

impl JobRunner {
    /// Creates a runner with default configuration.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn EventFetcher>,
        notifier: Arc<dyn Notifier>,
        formatter: NotificationFormatter,
    ) -> Self {
        Self::with_config(RunnerConfig::default(), fetcher, notifier, formatter)
    }

    /// Creates a runner with custom configuration.
    #[must_use]
    pub fn with_config(
        config: RunnerConfig,
        fetcher: Arc<dyn EventFetcher>,
        notifier: Arc<dyn Notifier>,
        formatter: NotificationFormatter,
    ) -> Self {
        Self {
            config,
            fetcher,
            notifier,
            formatter,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Runs `spec` over the window ending now.
    pub async fn run(&self, spec: &SearchSpec) -> RunReport {
        self.run_at(spec, Utc::now()).await
    }

    /// Runs `spec` over the window ending at `now`.
    pub async fn run_at(&self, spec: &SearchSpec, now: DateTime<Utc>) -> RunReport {
        let mut report = RunReport::new(spec, spec.window_ending_at(now));
        let span = info_span!("run", search = %spec.name, run_id = %report.run_id);

        self.execute(spec, &mut report).instrument(span).await;
        report
    }

    /// Builds the scheduler job for `spec`.
    ///
    /// Each invocation runs the search once and logs its outcome.
    #[must_use]
    pub fn job(self: &Arc<Self>, spec: Arc<SearchSpec>) -> Job {
        let runner = Arc::clone(self);
        Arc::new(move || -> JobFuture {
            let runner = Arc::clone(&runner);
            let spec = Arc::clone(&spec);
            Box::pin(async move {
                runner.run(&spec).await;
            })
        })
    }

    async fn execute(&self, spec: &SearchSpec, report: &mut RunReport) {
        let window = report.window;
        info!(
            title = %spec.title,
            from = %window.start_rfc3339(),
            until = %window.end_rfc3339(),
            "run started"
        );

        report.transition(RunState::Fetching);
        let retried = retry_once(|| self.fetch(spec, &window)).await;
        report.fetch_attempts = retried.attempts;

        let events = match retried.result {
            Ok(events) => events,
            Err(e) => {
                error!(error = %e, attempts = retried.attempts, "query failed");
                report.fail(e.to_string());
                return;
            }
        };

        report.transition(RunState::Summarizing);
        let digest = Digest::summarize(&events, spec.group_by_environment);
        report.total = digest.summary().total;
        report.entries.clone_from(&digest.summary().entries);

        report.transition(RunState::Deciding);
        if !should_notify(report.total, spec.threshold) {
            info!(
                total = report.total,
                threshold = spec.threshold,
                "below threshold"
            );
            report.transition(RunState::NotSent);
            return;
        }

        report.transition(RunState::Formatting);
        let payloads = self.payloads(spec, &window, digest);

        report.transition(RunState::Sending);
        match send_all(self.notifier.as_ref(), &payloads).await {
            Ok(sent) => {
                report.payloads_sent = sent;
                report.transition(RunState::Sent);
                info!(total = report.total, payloads = sent, "digest sent");
            }
            Err(e) => {
                if let PipelineError::NotificationSend { index, .. } = &e {
                    report.payloads_sent = *index;
                }
                error!(error = %e, "notification failed");
                report.fail(e.to_string());
            }
        }
    }

    async fn fetch(&self, spec: &SearchSpec, window: &TimeWindow) -> Result<Vec<LogEvent>> {
        let events = self
            .fetcher
            .fetch(&spec.query, window, self.config.max_results)
            .await?;
        debug!(backend = %self.fetcher.name(), events = events.len(), "fetched events");
        Ok(events)
    }

    fn payloads(
        &self,
        spec: &SearchSpec,
        window: &TimeWindow,
        digest: Digest,
    ) -> Vec<NotificationPayload> {
        match digest {
            Digest::Flat(summary) => {
                let title = format!("{} {}", spec.title, summary.total);
                let body = notification_body(summary.render(), summary.total);
                self.formatter
                    .format(&body, &spec.query, window, &title, &spec.channel)
            }
            Digest::ByEnvironment { groups, .. } if groups.is_empty() => {
                let title = format!("{} 0", spec.title);
                self.formatter
                    .format(NO_RESULTS, &spec.query, window, &title, &spec.channel)
            }
            Digest::ByEnvironment { groups, .. } => groups
                .iter()
                .flat_map(|group| {
                    let title = if group.environment.is_empty() {
                        format!("{} {}", spec.title, group.total)
                    } else {
                        format!("{} {} {}", spec.title, group.environment, group.total)
                    };
                    self.formatter.format(
                        &group.rendered_table,
                        &spec.query,
                        window,
                        &title,
                        &spec.channel,
                    )
                })
                .collect(),
        }
    }
}
