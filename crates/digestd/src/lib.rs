//! digestd - scheduled log digests
//!
//! Loads searches from a TOML file, runs each one on its schedule against
//! Loggly and posts the digests to Slack.

#![forbid(unsafe_code)]

pub mod app;
pub mod config;
pub mod error;
pub mod scheduler;

pub use app::{build_runner, schedule_all};
pub use config::{Credentials, DigestConfig, SearchEntry};
pub use error::{ConfigError, Result};
pub use scheduler::TokioScheduler;
