//! Single immediate retry for backend queries.
//!
//! The search backend fails transiently often enough that one extra attempt
//! is worth it. The operation is retried exactly once, with no delay; the
//! caller keeps the window fixed so both attempts ask for the same data.

use std::future::Future;

use tracing::warn;

use crate::error::Result;

/// Maximum number of attempts made by [`retry_once`].
pub const MAX_ATTEMPTS: u32 = 2;

/// Outcome of a retried operation.
#[derive(Debug)]
pub struct Retried<T> {
    /// The final result.
    pub result: Result<T>,
    /// How many times the operation ran.
    pub attempts: u32,
}

/// Runs `op`, running it once more if the first attempt fails.
///
/// The second failure, if any, is returned as is.
pub async fn retry_once<T, F, Fut>(mut op: F) -> Retried<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 1;
    let mut result = op().await;

    if let Err(e) = &result {
        warn!(error = %e, attempt = attempts, "operation failed, retrying once");
        attempts += 1;
        result = op().await;
    }

    Retried { result, attempts }
}
