//! Wiring between configuration, backends and the scheduler.

use std::sync::Arc;

use digest_clients::{LogglyClient, SlackWebhook};
use digest_pipeline::{
    JobRunner, LogNotifier, NotificationFormatter, Notifier, Scheduler, with_overlap_policy,
};
use tracing::info;

use crate::config::{Credentials, DigestConfig};
use crate::error::Result;

/// Builds the job runner for `config`.
///
/// With `dry_run` the Slack webhook is not needed: notifications go to the
/// log instead.
///
/// # Errors
///
/// Returns `ConfigError::Client` if a required credential is missing or a
/// client cannot be built.
pub fn build_runner(config: &DigestConfig, creds: &Credentials, dry_run: bool) -> Result<JobRunner> {
    let loggly = LogglyClient::new(creds.loggly(config)?)?;
    let formatter = NotificationFormatter::new(loggly.account());

    let notifier: Arc<dyn Notifier> = if dry_run {
        Arc::new(LogNotifier::new("dry-run"))
    } else {
        Arc::new(SlackWebhook::new(creds.slack(config)?)?)
    };
    info!(notifier = notifier.name(), account = loggly.account(), "backends ready");

    Ok(JobRunner::with_config(
        config.runner_config(),
        Arc::new(loggly),
        notifier,
        formatter,
    ))
}

/// Registers every configured search with `scheduler`.
///
/// Returns the number of registered searches.
///
/// # Errors
///
/// Returns the first search that fails validation or registration.
pub fn schedule_all(
    runner: &Arc<JobRunner>,
    config: &DigestConfig,
    scheduler: &mut dyn Scheduler,
) -> Result<usize> {
    let specs = config.specs()?;
    for spec in specs {
        let name = spec.name.clone();
        let schedule = spec.schedule;
        let job = with_overlap_policy(&name, config.overlap, runner.job(Arc::new(spec)));
        scheduler.register(&name, schedule, job)?;
    }
    Ok(scheduler.job_count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use digest_pipeline::{Job, Schedule};

    use crate::error::ConfigError;

    #[derive(Default)]
    struct RecordingScheduler {
        registered: Vec<(String, Schedule)>,
    }

    impl Scheduler for RecordingScheduler {
        fn register(
            &mut self,
            name: &str,
            schedule: Schedule,
            _job: Job,
        ) -> digest_pipeline::Result<()> {
            self.registered.push((name.to_string(), schedule));
            Ok(())
        }

        fn job_count(&self) -> usize {
            self.registered.len()
        }
    }

    const CONFIG: &str = r#"
[searches.b_daily]
query = "level:warn"
title = "Warnings"
daily = true
time = "6:30"
window_minutes = 1440

[searches.a_errors]
query = "level:error"
title = "Errors"
frequency_minutes = 10
window_minutes = 10
"#;

    fn credentials(webhook: &str) -> Credentials {
        Credentials {
            loggly_account: "acme".to_string(),
            loggly_token: "token".to_string(),
            loggly_base_url: None,
            slack_webhook: webhook.to_string(),
        }
    }

    #[test]
    fn dry_run_needs_no_webhook() {
        let config = DigestConfig::from_toml(CONFIG).unwrap();
        assert!(build_runner(&config, &credentials(""), true).is_ok());
    }

    #[test]
    fn missing_webhook_is_error() {
        let config = DigestConfig::from_toml(CONFIG).unwrap();
        let result = build_runner(&config, &credentials(""), false);
        assert!(matches!(result, Err(ConfigError::Client(_))));
    }

    #[test]
    fn missing_account_is_error_even_in_dry_run() {
        let config = DigestConfig::from_toml(CONFIG).unwrap();
        let creds = Credentials {
            loggly_account: String::new(),
            ..credentials("")
        };
        assert!(matches!(
            build_runner(&config, &creds, true),
            Err(ConfigError::Client(_))
        ));
    }

    #[test]
    fn runner_uses_configured_max_results() {
        let config = DigestConfig::from_toml(&format!("max_results = 42\n{CONFIG}")).unwrap();
        let runner = build_runner(&config, &credentials(""), true).unwrap();
        assert_eq!(runner.config().max_results, 42);
    }

    #[test]
    fn schedules_every_search_in_name_order() {
        let config = DigestConfig::from_toml(CONFIG).unwrap();
        let runner = Arc::new(build_runner(&config, &credentials(""), true).unwrap());
        let mut scheduler = RecordingScheduler::default();

        let count = schedule_all(&runner, &config, &mut scheduler).unwrap();

        assert_eq!(count, 2);
        assert_eq!(scheduler.registered[0].0, "a_errors");
        assert_eq!(scheduler.registered[0].1, Schedule::every_minutes(10));
        assert_eq!(scheduler.registered[1].0, "b_daily");
        assert!(scheduler.registered[1].1.is_daily());
    }
}
