//! Service-level error types covering transforms and the client store.

use thiserror::Error;

use super::dispatch::ProtocolVersion;
use crate::protocol;

/// Errors that end a request without a reply
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Malformed or truncated message bytes
    #[error("malformed message: {0}")]
    Format(#[from] protocol::Error),

    /// Version-specific transform failure
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),
}

/// Failures inside a [`VersionTransform`](super::VersionTransform)
#[derive(Error, Debug)]
pub enum TransformError {
    /// Message shorter than the transform's framing
    #[error("{version} message too short: need {needed} bytes, got {got}")]
    TooShort {
        /// Protocol version being handled
        version: ProtocolVersion,
        /// Bytes required
        needed: usize,
        /// Bytes available
        got: usize,
    },

    /// Response body does not fit the frame
    #[error("{version} response body of {len} bytes cannot be framed")]
    BodyTooLarge {
        /// Protocol version being handled
        version: ProtocolVersion,
        /// Body length
        len: usize,
    },

    /// Any other transform failure (bad hash, decryption error)
    #[error("{version} transform failed: {reason}")]
    Failed {
        /// Protocol version being handled
        version: ProtocolVersion,
        /// Failure description
        reason: String,
    },
}

/// Client store errors
///
/// Fatal when returned while opening a store, logged and skipped when
/// returned while serving a request.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be opened or initialized
    #[error("failed to open client store at {path}: {source}")]
    Open {
        /// Store location
        path: String,
        /// Underlying failure
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// SQLite backend error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A thread panicked while holding the store lock
    #[error("client store lock poisoned")]
    Poisoned,

    /// Other backend failure
    #[error("client store error: {0}")]
    Backend(String),
}

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
