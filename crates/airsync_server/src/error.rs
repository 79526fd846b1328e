//! Error types for request handling.

use airsync_codec::CodecError;
use airsync_state::StateError;
use thiserror::Error;

/// Result type for handler operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while handling a request.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The request body does not follow the command grammar.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request bytes could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The sync state machine failed.
    #[error(transparent)]
    State(#[from] StateError),
}

impl ServerError {
    /// Creates an `InvalidRequest` error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}
