//! Error types for the reactive stream core.

use std::sync::Arc;

/// Shared, thread-safe error payload carried by the error channel.
pub type BoxedError = Arc<dyn std::error::Error + Send + Sync>;

/// The error type delivered through the error channel of a subscription.
///
/// Errors are cheap to clone so that cold publishers such as
/// [`sources::error`](crate::sources::error) can replay the same error to
/// every subscriber.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A source failed to produce a value
    #[error("Upstream error: {0}")]
    Upstream(#[source] BoxedError),

    /// A function supplied to an operator failed or panicked
    #[error("Transform error: {0}")]
    Transform(#[source] BoxedError),

    /// A stage delivered a signal after a terminal signal
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// An operation timed out
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// A bounded buffer overflowed
    #[error("Buffer at capacity: {current}/{max}")]
    Capacity { current: usize, max: usize },

    /// No scheduler was available for a time-based stage
    #[error("Scheduler unavailable: {0}")]
    Scheduler(String),

    /// A custom error with a message
    #[error("{0}")]
    Custom(String),
}

/// Payload of an [`Error::Transform`] raised by a panicking function.
#[derive(Debug, Clone, thiserror::Error)]
#[error("panicked in {stage}: {message}")]
pub struct PanicError {
    pub stage: &'static str,
    pub message: String,
}

// Convenience constructors
impl Error {
    /// Create an upstream error from any error type
    pub fn upstream<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Upstream(Arc::new(error))
    }

    /// Create a transform error from any error type
    pub fn transform<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Transform(Arc::new(error))
    }

    /// Create a protocol violation error
    pub fn protocol_violation<S: Into<String>>(message: S) -> Self {
        Error::ProtocolViolation(message.into())
    }

    /// Create a timeout error
    pub fn timeout(duration_ms: u64) -> Self {
        Error::Timeout { duration_ms }
    }

    /// Create a capacity error
    pub fn capacity(current: usize, max: usize) -> Self {
        Error::Capacity { current, max }
    }

    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Error::Custom(message.into())
    }

    /// Convert a caught panic payload into a transform error.
    pub(crate) fn from_panic(stage: &'static str, payload: Box<dyn std::any::Any + Send>) -> Self {
        Error::transform(PanicError {
            stage,
            message: panic_message(payload.as_ref()),
        })
    }
}

/// Extract the message of a caught panic.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for Error {
    fn from(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Error::Upstream(Arc::from(e))
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Custom(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Custom(s.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Run `f`, turning a panic into an [`Error::Transform`].
pub(crate) fn catch_transform<R>(stage: &'static str, f: impl FnOnce() -> R) -> Result<R> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f))
        .map_err(|payload| Error::from_panic(stage, payload))
}

/// Helper trait for converting errors into our Error type
pub trait IntoError<T> {
    fn into_upstream_error(self) -> Result<T>;
    fn into_transform_error(self) -> Result<T>;
}

impl<T, E> IntoError<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn into_upstream_error(self) -> Result<T> {
        self.map_err(Error::upstream)
    }

    fn into_transform_error(self) -> Result<T> {
        self.map_err(Error::transform)
    }
}
