//! Error types for the cluster log.

use clog_core::CodecError;
use thiserror::Error;

/// Errors that can occur while driving a [`crate::ClusterLog`].
#[derive(Debug, Error)]
pub enum ClusterLogError {
    /// A snapshot or peer summary could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The configuration cannot be used.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type for cluster log operations.
pub type Result<T> = std::result::Result<T, ClusterLogError>;
