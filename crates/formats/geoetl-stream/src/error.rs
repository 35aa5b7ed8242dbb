//! Codec error types.

use geozero::error::GeozeroError;
use thiserror::Error;

/// Errors raised while encoding a record.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// A length does not fit the 32-bit length prefix.
    #[error("{what} of {len} bytes exceeds the 32-bit length prefix")]
    TooLarge {
        /// What was being encoded
        what: &'static str,
        /// Offending length
        len: usize,
    },

    /// Geometry could not be written as WKB.
    #[error("Failed to encode geometry as WKB: {0}")]
    Geometry(#[from] GeozeroError),
}

/// Errors raised while decoding a stream.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The stream ended in the middle of an item.
    #[error("Unexpected end of stream reading {what}: need {needed} bytes, {remaining} left")]
    Truncated {
        /// Item being decoded
        what: &'static str,
        /// Bytes required
        needed: usize,
        /// Bytes available
        remaining: usize,
    },

    /// A length prefix was negative.
    #[error("Negative length {len} for {what}")]
    NegativeLength {
        /// Item being decoded
        what: &'static str,
        /// Decoded length
        len: i32,
    },

    /// A tag did not name a known type.
    #[error("Unknown {what} tag {tag}")]
    UnknownTag {
        /// Kind of tag
        what: &'static str,
        /// Decoded tag
        tag: i32,
    },

    /// A string was not valid UTF-8.
    #[error("Invalid UTF-8 in string: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// A geometry block was not valid WKB.
    #[error("Invalid WKB geometry: {0}")]
    Geometry(#[from] GeozeroError),
}
