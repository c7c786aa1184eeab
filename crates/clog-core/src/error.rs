//! Error types for the cluster log core.

use thiserror::Error;

/// Errors raised while decoding encoded entries and summaries.
///
/// Decoding is all-or-nothing: any of these means the buffer was rejected and
/// no partially built value escapes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("truncated buffer: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("{type_name} requires decoder version {compat}, this build supports up to {supported}")]
    IncompatibleVersion {
        type_name: &'static str,
        compat: u8,
        supported: u8,
    },

    #[error("string is not valid utf-8")]
    InvalidUtf8,

    #[error("malformed data: {0}")]
    Malformed(String),

    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
