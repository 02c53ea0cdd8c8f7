use crate::BoxError;
use thiserror::Error;

/// Errors surfaced by initialization and flush.
///
/// Recording operations only ever fail argument validation up front; the
/// underlying client's asynchronous failures are never routed back to them.
#[derive(Debug, Error)]
pub enum Error {
    /// A required initialization input was missing, or a secret source
    /// resolved to something unusable. The gate stays closed and the call
    /// may be retried with corrected input.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An argument failed validation before it reached the buffer.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The underlying client reported a flush failure.
    #[error("flush failed: {0}")]
    Flush(BoxError),
}
