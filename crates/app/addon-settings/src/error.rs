use std::{io, path::PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

/// Failures while reading, parsing or writing settings documents.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot open settings document {}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("cannot store settings document {}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("malformed XML at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("invalid settings document: {0}")]
    Schema(String),

    #[error("settings definition is not initialized")]
    NotInitialized,

    #[error("settings definition is already initialized")]
    AlreadyInitialized,
}

impl Error {
    /// True when the error was caused by a file that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::Read { source, .. } if source.kind() == io::ErrorKind::NotFound
        )
    }
}
