//! Error types for the tag-stream codec.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while reading or writing a tag stream.
///
/// Any of these aborts the whole request: a malformed stream never
/// produces a partial message.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    /// The stream ended in the middle of a token.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// The next token was not the one the grammar requires.
    #[error("protocol error: expected {expected}, found {found}")]
    UnexpectedToken {
        /// What the grammar required at this position.
        expected: String,
        /// What was actually found.
        found: String,
    },

    /// A tag name or text leaf was not valid UTF-8.
    #[error("invalid UTF-8 in tag stream")]
    InvalidUtf8,

    /// A claimed length exceeds the allowed maximum.
    #[error("{what} length {claimed} exceeds maximum {max_allowed}")]
    SizeLimitExceeded {
        /// What carried the oversized length (tag name or content).
        what: &'static str,
        /// The length claimed by the stream.
        claimed: u64,
        /// The maximum the decoder allows.
        max_allowed: u64,
    },

    /// The stream violates the token grammar.
    #[error("malformed tag stream: {0}")]
    Malformed(String),

    /// Encoder start/end calls do not balance.
    #[error("unbalanced tags: {0}")]
    Unbalanced(String),
}

impl CodecError {
    /// Creates an `UnexpectedToken` error.
    pub fn unexpected_token(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates a `Malformed` error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Creates an `Unbalanced` error.
    pub fn unbalanced(message: impl Into<String>) -> Self {
        Self::Unbalanced(message.into())
    }
}
