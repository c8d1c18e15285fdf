//! Query, summarize, threshold and notify pipeline for scheduled log digests.
//!
//! `digest-pipeline` runs configured searches against a log-search backend,
//! counts the matching events per message and posts a digest to a messaging
//! channel when the count reaches a threshold.
//!
//! # Features
//!
//! - **Deterministic summaries**: Events grouped by message (optionally per
//!   environment) and rendered as a sorted two-column table
//! - **Threshold gate**: Notify only when enough events matched
//! - **Chunked payloads**: Long digests split to fit per-message line limits
//! - **One retry**: A failed query is repeated once over the same window
//! - **Pluggable backends**: [`EventFetcher`] and [`Notifier`] traits
//!
//! # Example
//!
//! ```rust
//! use digest_pipeline::{LogEvent, NotificationFormatter, TimeWindow, should_notify, summarize};
//! use chrono::Utc;
//!
//! let events = vec![LogEvent::new("a"), LogEvent::new("b"), LogEvent::new("a")];
//! let summary = summarize(&events);
//! assert_eq!(summary.total, 3);
//! assert_eq!(summary.render(), "a 2\nb 1");
//!
//! if should_notify(summary.total, 2) {
//!     let window = TimeWindow::ending_at(Utc::now(), 30);
//!     let payloads = NotificationFormatter::new("acme").format(
//!         &summary.render(),
//!         "level:error",
//!         &window,
//!         "Errors 3",
//!         "#alerts",
//!     );
//!     assert_eq!(payloads.len(), 1);
//! }
//! ```
//!
//! # Running a search
//!
//! A [`JobRunner`] ties the stages together:
//!
//! ```rust,ignore
//! use digest_pipeline::{JobRunner, LogNotifier, NotificationFormatter};
//! use std::sync::Arc;
//!
//! let runner = JobRunner::new(fetcher, Arc::new(LogNotifier::default()), NotificationFormatter::new("acme"));
//! let report = runner.run(&spec).await;
//! println!("{} events, state {}", report.total, report.state);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod fetcher;
pub mod formatter;
pub mod gate;
pub mod notifier;
pub mod retry;
pub mod runner;
pub mod schedule;
pub mod summarizer;
pub mod types;

// Re-export main types at crate root
pub use error::{PipelineError, Result};
pub use fetcher::{DEFAULT_MAX_RESULTS, EventFetcher};
pub use formatter::{
    DEFAULT_COLOR, DEFAULT_LINES_PER_MESSAGE, NotificationFormatter, chunk_lines, messages_needed,
};
pub use gate::{NO_RESULTS, notification_body, should_notify};
pub use notifier::{LogNotifier, Notifier, send_all};
pub use retry::{Retried, retry_once};
pub use runner::{JobRunner, RunReport, RunState, RunnerConfig};
pub use schedule::{
    Job, JobFuture, OverlapPolicy, Scheduler, jitter_minute, next_daily_run, with_overlap_policy,
};
pub use summarizer::{
    ENVIRONMENT_TAG_SUFFIX, Summary, environment_from_tags, render_table, summarize,
    summarize_by_environment, summarize_keyed_by_environment,
};
pub use types::{
    EnvGroup, LogEvent, NotificationPayload, Schedule, SearchSpec, SearchSpecBuilder, SummaryEntry,
    TimeWindow,
};
