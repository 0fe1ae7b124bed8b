//! Error types shared by the compressor and decompressor.

use thiserror::Error;

use crate::compress::MAX_INPUT_LEN;

/// Result type for compression and decompression operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by this crate.
///
/// Any error means the operation produced no usable output; callers must
/// discard whatever was written to a destination buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The one-time known-answer self-check did not reproduce its expected
    /// output. Every subsequent call fails the same way.
    #[error("codec self-check failed; this build cannot be trusted")]
    SelfCheckFailed,

    /// The input is larger than [`MAX_INPUT_LEN`] and cannot be compressed
    /// in a single call.
    #[error("input of {0} bytes exceeds the {max} byte single-call limit", max = MAX_INPUT_LEN)]
    InputTooLarge(usize),

    /// The destination buffer cannot hold the output.
    #[error("destination buffer capacity exhausted")]
    OutputOverflow,

    /// The compressed stream is structurally invalid.
    #[error("malformed compressed stream: {0}")]
    MalformedStream(&'static str),

    /// The stream terminated cleanly but decoded to a different number of
    /// bytes than the caller expected.
    #[error("stream decoded to {actual} bytes but {expected} were expected")]
    LengthMismatch {
        /// Length the caller asked for.
        expected: usize,
        /// Length the stream actually decoded to.
        actual: usize,
    },
}
