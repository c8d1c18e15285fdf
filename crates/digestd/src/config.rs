//! Daemon configuration.
//!
//! Searches are declared in a TOML file, one `[searches.<name>]` table each,
//! next to a handful of optional top-level settings. Credentials never live in
//! the file; they come from the environment or the command line.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveTime;
use digest_clients::{DEFAULT_TIMEOUT_SECS, DEFAULT_USERNAME, LogglyConfig, SlackConfig};
use digest_pipeline::{DEFAULT_MAX_RESULTS, OverlapPolicy, RunnerConfig, Schedule, SearchSpec};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// One `[searches.<name>]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchEntry {
    /// Query sent to Loggly.
    pub query: String,
    /// Notification title.
    pub title: String,
    /// Slack channel override.
    #[serde(default)]
    pub slack_channel: String,
    /// Minutes between runs for interval searches.
    #[serde(default)]
    pub frequency_minutes: u64,
    /// Whether the search runs once a day.
    #[serde(default)]
    pub daily: bool,
    /// Time of day (`H:MM`, UTC) for daily searches.
    #[serde(default)]
    pub time: String,
    /// Length of the query window in minutes.
    pub window_minutes: u32,
    /// Minimum event count before notifying.
    #[serde(default)]
    pub threshold: usize,
    /// Group events by their `-syslog` environment tag.
    #[serde(default)]
    pub group_by_environment: bool,
}

impl SearchEntry {
    fn schedule(&self, name: &str) -> Result<Schedule> {
        if self.daily {
            if self.frequency_minutes != 0 {
                return Err(ConfigError::search(
                    name,
                    "daily searches cannot set frequency_minutes",
                ));
            }
            if self.time.is_empty() {
                return Err(ConfigError::search(name, "daily searches need a time"));
            }
            let at = parse_time_of_day(&self.time)
                .ok_or_else(|| ConfigError::search(name, format!("invalid time '{}'", self.time)))?;
            return Ok(Schedule::daily(at));
        }

        if !self.time.is_empty() {
            return Err(ConfigError::search(
                name,
                "time is only valid for daily searches",
            ));
        }
        if self.frequency_minutes == 0 {
            return Err(ConfigError::search(
                name,
                "frequency_minutes must be greater than zero",
            ));
        }
        Ok(Schedule::every_minutes(self.frequency_minutes))
    }

    /// Converts the entry into a validated [`SearchSpec`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidSearch` if the schedule fields are
    /// inconsistent, or `ConfigError::Pipeline` if the search is rejected.
    pub fn to_spec(&self, name: &str) -> Result<SearchSpec> {
        let schedule = self.schedule(name)?;

        let spec = SearchSpec::builder(name, &self.query, &self.title)
            .channel(&self.slack_channel)
            .window_minutes(self.window_minutes)
            .threshold(self.threshold)
            .schedule(schedule)
            .group_by_environment(self.group_by_environment)
            .build()?;
        Ok(spec)
    }
}

/// Parses `H:MM` or `HH:MM`.
fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let (hours, minutes) = value.trim().split_once(':')?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return None;
    }
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

const fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

fn default_username() -> String {
    DEFAULT_USERNAME.to_string()
}

const fn default_http_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// The configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DigestConfig {
    /// Maximum events requested per query.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// What to do when a trigger finds the previous run still going.
    #[serde(default)]
    pub overlap: OverlapPolicy,
    /// Username on Slack messages.
    #[serde(default = "default_username")]
    pub username: String,
    /// Timeout for every HTTP request.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Configured searches by name.
    #[serde(default)]
    pub searches: BTreeMap<String, SearchEntry>,
}

impl DigestConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.max_results == 0 {
            return Err(ConfigError::InvalidSetting(
                "max_results must be greater than zero".to_string(),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting(
                "http_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.username.is_empty() {
            return Err(ConfigError::InvalidSetting(
                "username cannot be empty".to_string(),
            ));
        }
        if self.searches.is_empty() {
            return Err(ConfigError::InvalidSetting(
                "no searches configured".to_string(),
            ));
        }

        self.specs().map(|_| ())
    }

    /// Returns every search as a [`SearchSpec`], ordered by name.
    ///
    /// # Errors
    ///
    /// Returns the first search that fails validation.
    pub fn specs(&self) -> Result<Vec<SearchSpec>> {
        self.searches
            .iter()
            .map(|(name, entry)| entry.to_spec(name))
            .collect()
    }

    /// Returns the named search.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidSearch` if no search has that name.
    pub fn spec(&self, name: &str) -> Result<SearchSpec> {
        self.searches
            .get(name)
            .ok_or_else(|| ConfigError::search(name, "no such search"))?
            .to_spec(name)
    }

    /// Returns the runner settings.
    #[must_use]
    pub const fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            max_results: self.max_results,
        }
    }
}

/// Backend credentials.
#[derive(Clone, Default)]
pub struct Credentials {
    /// Loggly account subdomain.
    pub loggly_account: String,
    /// Loggly API token.
    pub loggly_token: String,
    /// Override for the Loggly API base URL.
    pub loggly_base_url: Option<String>,
    /// Slack incoming-webhook URL.
    pub slack_webhook: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("loggly_account", &self.loggly_account)
            .field("loggly_token", &"<redacted>")
            .field("loggly_base_url", &self.loggly_base_url)
            .field("slack_webhook", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Builds the Loggly client settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Client` if the account or token is missing.
    pub fn loggly(&self, config: &DigestConfig) -> Result<LogglyConfig> {
        let mut loggly = LogglyConfig::new(&self.loggly_account, &self.loggly_token)?
            .with_timeout_secs(config.http_timeout_secs);
        if let Some(url) = &self.loggly_base_url {
            loggly = loggly.with_base_url(url);
        }
        Ok(loggly)
    }

    /// Builds the Slack webhook settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Client` if the webhook URL is missing or invalid.
    pub fn slack(&self, config: &DigestConfig) -> Result<SlackConfig> {
        Ok(SlackConfig::new(&self.slack_webhook)?
            .with_username(&config.username)
            .with_timeout_secs(config.http_timeout_secs))
    }
}
