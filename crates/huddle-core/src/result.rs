//! Result type aliases for Huddle.

use crate::HuddleError;

/// A specialized `Result` type for Huddle operations.
pub type HuddleResult<T> = Result<T, HuddleError>;

/// A boxed future returning a `HuddleResult`.
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = HuddleResult<T>> + Send + 'a>>;

/// Adds operation context to a failed `HuddleResult`.
pub trait ResultExt<T> {
    /// Wraps the error with the name of the failing operation.
    fn context(self, operation: &str) -> HuddleResult<T>;
}

impl<T> ResultExt<T> for HuddleResult<T> {
    fn context(self, operation: &str) -> HuddleResult<T> {
        self.map_err(|e| e.context(operation))
    }
}
