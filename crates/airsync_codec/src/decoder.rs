//! Recursive-descent reader over a nested tag stream.

use crate::error::{CodecError, CodecResult};
use crate::token::{describe, MAX_CONTENT_LENGTH, MAX_NAME_LENGTH, TOKEN_CONTENT, TOKEN_END, TOKEN_START};

/// A reader over a nested tag stream.
///
/// A compound value on the wire is `StartTag (content | compound)* EndTag`.
/// The decoder exposes exactly the primitives a grammar walk needs:
/// [`try_start_tag`](TagDecoder::try_start_tag) peeks and only consumes on
/// a match, [`element_content`](TagDecoder::element_content) reads a leaf,
/// and [`require_end_tag`](TagDecoder::require_end_tag) fails when the
/// stream does not close the innermost tag where the grammar demands it.
pub struct TagDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> TagDecoder<'a> {
    /// Creates a decoder over the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Consumes a start tag if the next token is a start tag with the
    /// given name, returning `true`. Otherwise leaves the position
    /// untouched and returns `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is malformed at this position
    /// (truncated token, oversized or non-UTF-8 name).
    pub fn try_start_tag(&mut self, name: &str) -> CodecResult<bool> {
        let saved = self.pos;
        if self.is_empty() || self.data[self.pos] != TOKEN_START {
            return Ok(false);
        }
        self.pos += 1;

        let len = self.read_length("tag name", MAX_NAME_LENGTH)?;
        let bytes = self.read_bytes(len)?;
        let found = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;

        if found == name {
            Ok(true)
        } else {
            self.pos = saved;
            Ok(false)
        }
    }

    /// Reads a content leaf and returns its raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the next token is not content.
    pub fn element_content(&mut self) -> CodecResult<&'a [u8]> {
        self.expect_token(TOKEN_CONTENT, "content")?;
        let len = self.read_length("content", MAX_CONTENT_LENGTH)?;
        self.read_bytes(len)
    }

    /// Reads a content leaf and returns it as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns an error if the next token is not content or the payload
    /// is not valid UTF-8.
    pub fn text_content(&mut self) -> CodecResult<String> {
        let bytes = self.element_content()?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    /// Consumes the end marker of the innermost open tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the next token is not an end marker.
    pub fn require_end_tag(&mut self) -> CodecResult<()> {
        self.expect_token(TOKEN_END, "end tag")
    }

    /// Returns true if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Returns the remaining unread bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn expect_token(&mut self, token: u8, expected: &str) -> CodecResult<()> {
        let byte = self.read_byte()?;
        if byte == token {
            Ok(())
        } else {
            self.pos -= 1;
            Err(CodecError::unexpected_token(expected, describe(byte)))
        }
    }

    #[inline]
    fn read_byte(&mut self) -> CodecResult<u8> {
        if self.pos >= self.data.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if self.pos + len > self.data.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Reads a varint length (7 bits per byte, high bit continues) and
    /// validates it against the given maximum.
    fn read_length(&mut self, what: &'static str, max_allowed: u64) -> CodecResult<usize> {
        let mut value: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = self.read_byte()?;
            if shift >= 63 && byte > 1 {
                return Err(CodecError::malformed("length varint overflows u64"));
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        if value > max_allowed {
            return Err(CodecError::SizeLimitExceeded {
                what,
                claimed: value,
                max_allowed,
            });
        }
        Ok(value as usize)
    }
}
