//! Error taxonomy for session controller operations.

use crate::transport::TransportError;

/// Errors returned by [`crate::controller::PlayerSessionController`].
///
/// Every command failure surfaces as one of these; nothing is thrown past the
/// controller boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Duplicate player id, unresolvable source, or the player refused `create`.
    #[error("creation failed: {0}")]
    CreationError(String),
    /// Out-of-range argument; raised before anything reaches the transport.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Command against an unknown or removed player id.
    #[error("player not found: {0}")]
    NotFound(String),
    /// The external player did not respond or answered with a failure.
    #[error("transport error: {0}")]
    TransportError(String),
}

impl SessionError {
    pub(crate) fn not_found(id: &str) -> Self {
        SessionError::NotFound(id.to_string())
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        SessionError::TransportError(err.to_string())
    }
}
