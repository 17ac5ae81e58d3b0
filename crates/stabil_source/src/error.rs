//! Error types for reading tracked source files.

use std::path::PathBuf;

/// Errors that can occur when a tracked source file is read on demand.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The file was tracked but no longer exists on disk.
    #[error("source file {path} no longer exists")]
    MissingSource {
        /// The path that was requested.
        path: PathBuf,
    },

    /// Any other I/O failure while reading the file.
    #[error("failed to read source {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl SourceError {
    /// Classifies an I/O error raised while reading `path`.
    pub(crate) fn from_io(path: PathBuf, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::MissingSource { path }
        } else {
            Self::Io { path, source }
        }
    }
}
