//! # Decode Error Types
//!
//! All errors a container decoder can report.

use thiserror::Error;
use voxbake_core::ContainerFormat;

/// Errors that can occur while decoding a voxel container.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The fixed magic/version prefix did not match.
    #[error("invalid {format} header: expected {expected:?}, found {found:?}")]
    InvalidHeader {
        /// Format whose header was checked.
        format: ContainerFormat,
        /// Expected prefix.
        expected: &'static str,
        /// Bytes actually found (lossy).
        found: String,
    },

    /// A read ran past the end of the stream or of a chunk.
    #[error("truncated stream at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    TruncatedStream {
        /// Bytes the read needed.
        needed: usize,
        /// Bytes that were left.
        remaining: usize,
        /// Absolute offset of the failed read.
        offset: usize,
    },

    /// A length or count field was negative.
    #[error("invalid length {length} at offset {offset}")]
    InvalidLength {
        /// The raw value.
        length: i64,
        /// Absolute offset of the field.
        offset: usize,
    },

    /// The compressed payload could not be inflated.
    #[error("decompression failed: {0}")]
    DecompressionFailure(#[source] std::io::Error),

    /// A chunk tag the decoder cannot size or skip.
    #[error("unresolved chunk '{tag}' at offset {offset}")]
    UnresolvedChunk {
        /// Chunk tag (lossy).
        tag: String,
        /// Absolute offset of the tag.
        offset: usize,
    },

    /// No registered decoder accepts the input.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// Creates an `InvalidHeader` from the bytes found.
    #[must_use]
    pub fn invalid_header(format: ContainerFormat, expected: &'static str, found: &[u8]) -> Self {
        Self::InvalidHeader {
            format,
            expected,
            found: String::from_utf8_lossy(found).into_owned(),
        }
    }

    /// Creates an `UnresolvedChunk` from a raw tag.
    #[must_use]
    pub fn unresolved_chunk(tag: [u8; 4], offset: usize) -> Self {
        Self::UnresolvedChunk {
            tag: String::from_utf8_lossy(&tag).into_owned(),
            offset,
        }
    }
}

/// Result type for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;
