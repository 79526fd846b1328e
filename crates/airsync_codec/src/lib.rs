//! # AirSync Codec
//!
//! Nested tag-stream wire codec for AirSync.
//!
//! The protocol serializes requests and responses as an ordered, nested
//! tag stream: a compound value is `StartTag (content | compound)* EndTag`,
//! with UTF-8 text leaves for most fields and binary-safe leaves for
//! payload-bearing fields.
//!
//! This crate provides:
//! - [`TagDecoder`] — recursive-descent reader (`try_start_tag`,
//!   `element_content`, `require_end_tag`)
//! - [`TagEncoder`] — mirrored writer with balance checking
//!
//! ## Usage
//!
//! ```
//! use airsync_codec::{TagDecoder, TagEncoder};
//!
//! let mut enc = TagEncoder::new();
//! enc.start_tag("Status").unwrap();
//! enc.text("1").unwrap();
//! enc.end_tag().unwrap();
//! let bytes = enc.into_bytes().unwrap();
//!
//! let mut dec = TagDecoder::new(&bytes);
//! assert!(dec.try_start_tag("Status").unwrap());
//! assert_eq!(dec.text_content().unwrap(), "1");
//! dec.require_end_tag().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod token;

pub use decoder::TagDecoder;
pub use encoder::TagEncoder;
pub use error::{CodecError, CodecResult};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn text_leaf_round_trips(name in "[A-Za-z][A-Za-z0-9]{0,15}", body in ".{0,64}") {
            let mut enc = TagEncoder::new();
            enc.start_tag(&name).unwrap();
            enc.text(&body).unwrap();
            enc.end_tag().unwrap();
            let bytes = enc.into_bytes().unwrap();

            let mut dec = TagDecoder::new(&bytes);
            prop_assert!(dec.try_start_tag(&name).unwrap());
            prop_assert_eq!(dec.text_content().unwrap(), body);
            dec.require_end_tag().unwrap();
            prop_assert!(dec.is_empty());
        }

        #[test]
        fn binary_leaf_round_trips(body in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut enc = TagEncoder::new();
            enc.start_tag("Blob").unwrap();
            enc.content(&body).unwrap();
            enc.end_tag().unwrap();
            let bytes = enc.into_bytes().unwrap();

            let mut dec = TagDecoder::new(&bytes);
            prop_assert!(dec.try_start_tag("Blob").unwrap());
            prop_assert_eq!(dec.element_content().unwrap(), body.as_slice());
            dec.require_end_tag().unwrap();
        }
    }
}
