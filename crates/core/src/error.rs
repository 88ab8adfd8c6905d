//! Error categories shared by every client component.

use serde::Serialize;

/// Failure categories surfaced to the presentation layer.
///
/// Every error the client produces maps onto exactly one of these, which
/// decides how it is rendered and whether a retry makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// HTTP 401. Forces a return to the unauthenticated state.
    Unauthorized,
    /// Any other 4xx. The server message is shown verbatim when present.
    ClientError,
    /// HTTP 5xx. Shown as a generic failure.
    ServerError,
    /// Network failure or timeout. Eligible for a user-initiated retry.
    Transient,
    /// Client-side pre-flight rejection. Never reaches the network.
    ValidationError,
}

impl ErrorKind {
    /// Whether retrying the same request could reasonably succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient | ErrorKind::ServerError)
    }
}

/// A domain rule was violated while building a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
}
