//! Deadline wrapper for async operations.

use huddle_core::HuddleError;
use std::future::Future;
use std::time::Duration;

/// Wraps an async operation with a timeout.
///
/// The inner future is dropped when the deadline passes, which releases
/// anything it owns (an open transaction rolls back on drop).
pub async fn with_timeout<F, Fut, T>(duration: Duration, f: F) -> Result<T, HuddleError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, HuddleError>>,
{
    tokio::time::timeout(duration, f())
        .await
        .map_err(|_| HuddleError::Timeout(format!("Operation timed out after {:?}", duration)))?
}
