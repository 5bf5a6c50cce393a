//! Engine error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the indexing engine.
///
/// Store-level failures are fatal to the worker loop; everything else is
/// scoped to a single task (or a single file within a fan-out) and only logged.
#[derive(Debug, Error)]
pub enum EngineError {
    /// SQLite failure on the writer or a reader connection
    #[error("Index store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Read pool could not hand out a connection
    #[error("Index read pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// I/O failure on a single vault file
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File-system watcher could not be created or attached
    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Path is outside the vault, not a note, or otherwise unusable
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Target note already exists
    #[error("Note already exists: {0}")]
    NoteExists(String),

    /// A task panicked; the worker dropped it and kept running
    #[error("Task panicked: {0}")]
    TaskPanicked(String),

    /// The worker loop has exited; no more tasks will be processed
    #[error("Index worker is not running")]
    WorkerStopped,

    /// The worker thread panicked or was cancelled
    #[error("Index worker join failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error must stop the worker loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Store(_) | EngineError::Pool(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_are_fatal() {
        let err = EngineError::from(rusqlite::Error::InvalidQuery);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_file_errors_are_not_fatal() {
        let err = EngineError::io(
            "pages/a.md",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("pages/a.md"));
        assert!(!EngineError::InvalidPath("x".into()).is_fatal());
        assert!(!EngineError::TaskPanicked("boom".into()).is_fatal());
    }
}
