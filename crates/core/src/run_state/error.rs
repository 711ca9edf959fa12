use std::path::PathBuf;
use thiserror::Error;

/// Errors from a run store.
#[derive(Debug, Error)]
pub enum RunStoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize run record: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RunStoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
