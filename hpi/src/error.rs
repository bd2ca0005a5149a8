//! Error types for HPI parsing and extraction.

use thiserror::Error;

/// Result type for HPI operations.
pub type Result<T> = std::result::Result<T, Error>;

/// HPI error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying stream error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive or chunk magic does not match
    #[error("invalid magic: expected {expected:#010x}, got {actual:#010x}")]
    BadMagic { expected: u32, actual: u32 },

    /// Archive version is not the supported release version
    #[error("unsupported archive version {0:#010x}")]
    UnsupportedVersion(u32),

    /// Entry name has no NUL terminator inside the directory blob
    #[error("unterminated entry name at offset {0}")]
    TruncatedName(u32),

    /// A record's derived end exceeds its container
    #[error("{context} ends at {end}, past the bound {limit}")]
    OutOfBoundsOffset {
        context: &'static str,
        end: u64,
        limit: u64,
    },

    /// File or chunk compression type is not in {0, 1, 2}
    #[error("invalid compression type {0}")]
    InvalidCompressionType(u8),

    /// Computed chunk checksum differs from the stored one
    #[error("chunk {index} checksum mismatch: stored {expected:#010x}, computed {actual:#010x}")]
    ChunkChecksumMismatch {
        index: usize,
        expected: u32,
        actual: u32,
    },

    /// Sizes that must agree do not
    #[error("size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    /// Decompression would exceed the output buffer
    #[error("output overflow: {context}")]
    OutputOverflow { context: &'static str },

    /// Input ran out before decompression finished
    #[error("truncated input: {context}")]
    TruncatedInput { context: &'static str },

    /// The zlib inflater reported an error
    #[error("inflate error: {0}")]
    InflateError(String),
}
