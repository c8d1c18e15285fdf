//! Timer-driven [`Scheduler`] on the tokio runtime.
//!
//! Every registered search gets one long-lived timer task. Each trigger spawns
//! the job as its own task, so a slow run never delays another search or the
//! next trigger of the same search.

use std::time::Duration;

use chrono::Utc;
use digest_pipeline::{Job, PipelineError, Schedule, Scheduler, jitter_minute, next_daily_run};
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Upper bound (exclusive) of the random last minute digit for daily searches.
pub const DAILY_JITTER_DIGITS: u32 = 8;

/// Runs jobs from tokio timers.
#[derive(Debug)]
pub struct TokioScheduler {
    handles: Vec<JoinHandle<()>>,
    jitter: bool,
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TokioScheduler {
    /// Creates a scheduler that jitters daily searches.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handles: Vec::new(),
            jitter: true,
        }
    }

    /// Enables or disables daily jitter.
    #[must_use]
    pub const fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Stops every timer. Runs already in flight are not cancelled.
    pub fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }

    fn spawn_interval(name: String, minutes: u64, job: Job) -> JoinHandle<()> {
        let period = Duration::from_secs(minutes.saturating_mul(60));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                debug!(search = %name, "trigger");
                tokio::spawn(job());
            }
        })
    }

    fn spawn_daily(name: String, at: chrono::NaiveTime, job: Job) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let next = next_daily_run(now, at);
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                debug!(search = %name, next = %next.to_rfc3339(), "waiting for daily trigger");
                tokio::time::sleep(wait).await;
                debug!(search = %name, "trigger");
                tokio::spawn(job());
            }
        })
    }
}

impl Scheduler for TokioScheduler {
    fn register(
        &mut self,
        name: &str,
        schedule: Schedule,
        job: Job,
    ) -> digest_pipeline::Result<()> {
        let handle = match schedule {
            Schedule::Interval { minutes: 0 } => {
                return Err(PipelineError::configuration(format!(
                    "search '{name}' has a zero-minute interval"
                )));
            }
            Schedule::Interval { minutes } => {
                info!(search = %name, minutes, "scheduled interval search");
                Self::spawn_interval(name.to_string(), minutes, job)
            }
            Schedule::Daily { at } => {
                let at = if self.jitter {
                    jitter_minute(at, rand::thread_rng().gen_range(0..DAILY_JITTER_DIGITS))
                } else {
                    at
                };
                info!(search = %name, at = %at.format("%H:%M"), "scheduled daily search");
                Self::spawn_daily(name.to_string(), at, job)
            }
        };

        self.handles.push(handle);
        Ok(())
    }

    fn job_count(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
