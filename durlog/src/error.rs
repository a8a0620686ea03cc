//! Error types for the durable log writer

use std::io;
use std::path::PathBuf;

/// Result type for writer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the writer.
///
/// Disk failures during background flushes are never returned to producers;
/// they are reported on standard error and the batch is retried. Only
/// explicit [`LogWriter::flush`](crate::LogWriter::flush) calls see them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The writer has been shut down and no longer accepts records
    #[error("log writer closed")]
    Closed,

    /// Failed to create the log directory
    #[error("failed to create log directory at {path}: {source}")]
    CreateDirectory {
        /// The directory that could not be created
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// A background thread could not be started
    #[error("failed to spawn writer thread: {0}")]
    Spawn(#[source] io::Error),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// I/O error while flushing
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
