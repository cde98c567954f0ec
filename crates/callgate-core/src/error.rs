//! Error types for Callgate

use thiserror::Error;

/// Boxed error raised by a coroutine body
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Core Callgate errors
#[derive(Error, Debug)]
pub enum CoroutineError {
    /// Injected at the current suspension point by `cancel()`
    #[error("Coroutine cancelled")]
    Cancelled,

    #[error("Coroutine body failed: {0}")]
    Body(#[source] BoxError),

    #[error("Invalid quorum threshold: {threshold} of {children} children")]
    InvalidThreshold { threshold: usize, children: usize },

    #[error("Coroutine body awaited a future that is not a coroutine event")]
    ForeignAwait,

    #[error("Coroutine body waited on more than one event at a time")]
    ConcurrentWait,

    #[error("Synchronous resume limit exceeded: {0}")]
    SyncResumeLimit(usize),
}

impl CoroutineError {
    /// Wrap an arbitrary error raised inside a body
    pub fn body(err: impl Into<BoxError>) -> Self {
        CoroutineError::Body(err.into())
    }

    /// Is this the cancellation signal (vs an ordinary failure)?
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoroutineError::Cancelled)
    }
}

/// Result type for Callgate operations
pub type CoroutineResult<T> = Result<T, CoroutineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_error_keeps_message() {
        let err = CoroutineError::body("disk on fire");
        assert_eq!(err.to_string(), "Coroutine body failed: disk on fire");
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_cancelled_is_distinguished() {
        assert!(CoroutineError::Cancelled.is_cancelled());
        assert!(!CoroutineError::ForeignAwait.is_cancelled());
    }

    #[test]
    fn test_invalid_threshold_display() {
        let err = CoroutineError::InvalidThreshold {
            threshold: 3,
            children: 2,
        };
        assert_eq!(err.to_string(), "Invalid quorum threshold: 3 of 2 children");
    }
}
