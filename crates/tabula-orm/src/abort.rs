//! Request abort signal used by the `..._or_die` lookups.

use tracing::error;

/// Message handed to the abort handler when an `..._or_die` lookup misses.
pub const NOT_FOUND_MESSAGE: &str = "Something went wrong";

/// Stops the current request with a user-facing message.
///
/// The request layer decides what "stop" means (an error page, a 404, a
/// closed connection). The lookup that called it returns
/// [`OrmError::Aborted`](crate::OrmError::Aborted) right after and does no
/// further work.
pub trait AbortHandler: Send + Sync {
    /// Signals that the current request must not continue.
    fn abort(&self, message: &str);
}

/// Default handler: records the abort in the log and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAbort;

impl AbortHandler for LogAbort {
    fn abort(&self, message: &str) {
        error!(reason = message, "Aborting request");
    }
}
