//! Tag-stream encoder.

use crate::error::{CodecError, CodecResult};
use crate::token::{MAX_CONTENT_LENGTH, MAX_NAME_LENGTH, TOKEN_CONTENT, TOKEN_END, TOKEN_START};

/// A writer for the nested tag stream.
///
/// Mirrors the decoder: [`start_tag`](TagEncoder::start_tag),
/// [`content`](TagEncoder::content) and [`end_tag`](TagEncoder::end_tag)
/// calls must balance, and encoding order is significant — each message
/// type defines a fixed field order.
pub struct TagEncoder {
    buffer: Vec<u8>,
    open: Vec<String>,
}

impl TagEncoder {
    /// Creates a new encoder.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            open: Vec::new(),
        }
    }

    /// Creates a new encoder with the specified buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            open: Vec::new(),
        }
    }

    /// Opens a tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or too long.
    pub fn start_tag(&mut self, name: &str) -> CodecResult<()> {
        if name.is_empty() {
            return Err(CodecError::malformed("empty tag name"));
        }
        if name.len() as u64 > MAX_NAME_LENGTH {
            return Err(CodecError::SizeLimitExceeded {
                what: "tag name",
                claimed: name.len() as u64,
                max_allowed: MAX_NAME_LENGTH,
            });
        }
        self.buffer.push(TOKEN_START);
        self.write_length(name.len());
        self.buffer.extend_from_slice(name.as_bytes());
        self.open.push(name.to_string());
        Ok(())
    }

    /// Writes a binary-safe content leaf inside the innermost open tag.
    ///
    /// # Errors
    ///
    /// Returns an error if no tag is open or the payload is too long.
    pub fn content(&mut self, bytes: &[u8]) -> CodecResult<()> {
        if self.open.is_empty() {
            return Err(CodecError::unbalanced("content outside any tag"));
        }
        if bytes.len() as u64 > MAX_CONTENT_LENGTH {
            return Err(CodecError::SizeLimitExceeded {
                what: "content",
                claimed: bytes.len() as u64,
                max_allowed: MAX_CONTENT_LENGTH,
            });
        }
        self.buffer.push(TOKEN_CONTENT);
        self.write_length(bytes.len());
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Writes a UTF-8 text leaf inside the innermost open tag.
    pub fn text(&mut self, text: &str) -> CodecResult<()> {
        self.content(text.as_bytes())
    }

    /// Closes the innermost open tag.
    ///
    /// # Errors
    ///
    /// Returns an error if no tag is open.
    pub fn end_tag(&mut self) -> CodecResult<()> {
        match self.open.pop() {
            Some(_) => {
                self.buffer.push(TOKEN_END);
                Ok(())
            }
            None => Err(CodecError::unbalanced("end tag with no open tag")),
        }
    }

    /// Consumes the encoder and returns the encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if any tag is still open.
    pub fn into_bytes(self) -> CodecResult<Vec<u8>> {
        if let Some(name) = self.open.last() {
            return Err(CodecError::unbalanced(format!("tag <{name}> never closed")));
        }
        Ok(self.buffer)
    }

    /// Returns the number of currently open tags.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    fn write_length(&mut self, len: usize) {
        let mut value = len as u64;
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.buffer.push(byte);
                break;
            }
            self.buffer.push(byte | 0x80);
        }
    }
}

impl Default for TagEncoder {
    fn default() -> Self {
        Self::new()
    }
}
