//! Scheduling seam for recurring searches.
//!
//! The pipeline never owns a timer. A [`Scheduler`] implementation receives
//! each search's [`Schedule`] and a [`Job`] to invoke on every trigger. The
//! helpers here compute trigger times and apply the [`OverlapPolicy`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Days, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::types::Schedule;

/// A boxed, sendable unit of work.
pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A job invoked on every trigger of a search.
pub type Job = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// Something that invokes jobs on a schedule.
pub trait Scheduler {
    /// Registers `job` to run on `schedule`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Configuration` if the schedule cannot be honored.
    fn register(&mut self, name: &str, schedule: Schedule, job: Job) -> Result<()>;

    /// Returns the number of registered jobs.
    fn job_count(&self) -> usize;
}

/// What to do when a trigger fires while the previous run of the same search
/// is still in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Start another run alongside the one in progress.
    #[default]
    Allow,
    /// Skip the trigger.
    Skip,
}

/// Wraps `job` so that it follows `policy`.
#[must_use]
pub fn with_overlap_policy(name: &str, policy: OverlapPolicy, job: Job) -> Job {
    match policy {
        OverlapPolicy::Allow => job,
        OverlapPolicy::Skip => {
            let running = Arc::new(AtomicBool::new(false));
            let name: Arc<str> = Arc::from(name);
            Arc::new(move || -> JobFuture {
                let running = Arc::clone(&running);
                let name = Arc::clone(&name);
                let job = Arc::clone(&job);
                Box::pin(async move {
                    if running.swap(true, Ordering::AcqRel) {
                        warn!(search = %name, "previous run still in progress, skipping trigger");
                        return;
                    }
                    let _guard = RunningGuard(running);
                    job().await;
                })
            })
        }
    }
}

/// Clears a search's running flag when the run ends, even by panic or abort.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Returns the first instant strictly after `now` whose time of day is `at`.
#[must_use]
pub fn next_daily_run(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today.checked_add_days(Days::new(1)).unwrap_or(today)
    }
}

/// Replaces the last digit of `at`'s minute with `digit`.
///
/// Spreads daily searches configured for the same time over a few minutes.
/// `digit` is clamped to 9.
#[must_use]
pub fn jitter_minute(at: NaiveTime, digit: u32) -> NaiveTime {
    let minute = at.minute() / 10 * 10 + digit.min(9);
    at.with_minute(minute).unwrap_or(at)
}
