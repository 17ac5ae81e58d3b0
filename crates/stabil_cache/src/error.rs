//! Error types for persistence and session operations.

use std::path::PathBuf;

use stabil_source::SourceError;

/// Errors that can occur while loading, recording, or flushing session data.
///
/// Most read paths are fail-safe: a corrupt node record is dropped and an
/// unreadable store degrades to a cold start. This enum carries the failures
/// that callers still need to see, and describes the degraded ones in logs.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The embedded database reported an error.
    #[error("data store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A persisted value could not be decoded.
    #[error("corrupt data: {reason}")]
    CorruptData {
        /// Description of what failed to decode.
        reason: String,
    },

    /// The persisted data was written by an incompatible layout or configuration.
    #[error("schema mismatch: expected {expected}, found {actual}")]
    SchemaMismatch {
        /// The value this build expects.
        expected: String,
        /// The value found in the store.
        actual: String,
    },

    /// An I/O error occurred on the data file itself.
    #[error("data file I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An attribute value could not be serialized or deserialized.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// A source file needed for fingerprinting could not be read.
    #[error(transparent)]
    Source(#[from] SourceError),
}
