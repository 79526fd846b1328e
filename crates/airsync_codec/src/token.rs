//! Token constants shared by the decoder and encoder.

/// Marks the start of a tag; followed by a varint-length UTF-8 name.
pub(crate) const TOKEN_START: u8 = 0x01;

/// Marks a content leaf; followed by a varint-length payload.
pub(crate) const TOKEN_CONTENT: u8 = 0x02;

/// Marks the end of the innermost open tag.
pub(crate) const TOKEN_END: u8 = 0x03;

/// Maximum allowed tag-name length in bytes.
pub(crate) const MAX_NAME_LENGTH: u64 = 255;

/// Maximum allowed content length.
/// This prevents allocation-based DoS from untrusted input.
pub(crate) const MAX_CONTENT_LENGTH: u64 = 16 * 1024 * 1024;

/// Human-readable name for a token byte, used in error messages.
pub(crate) fn describe(token: u8) -> String {
    match token {
        TOKEN_START => "start tag".to_string(),
        TOKEN_CONTENT => "content".to_string(),
        TOKEN_END => "end tag".to_string(),
        other => format!("unknown token 0x{other:02x}"),
    }
}
