//! Trait for log-search backends.
//!
//! This module provides the [`EventFetcher`] trait for abstracting over the
//! remote search service, so the pipeline can run against the real backend
//! or an in-memory stand-in.

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{LogEvent, TimeWindow};

/// Default cap on events requested per query.
pub const DEFAULT_MAX_RESULTS: usize = 5000;

/// A source of log events.
///
/// Implementors issue one bounded query per call and decode every returned
/// record into a [`LogEvent`].
#[async_trait]
pub trait EventFetcher: Send + Sync + fmt::Debug {
    /// Returns the name of this backend.
    fn name(&self) -> &str;

    /// Fetches at most `max_results` events matching `query` within `window`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::BackendQuery` on network, auth or decode failure.
    async fn fetch(
        &self,
        query: &str,
        window: &TimeWindow,
        max_results: usize,
    ) -> Result<Vec<LogEvent>>;
}
