use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudiochunkError {
    #[error("Media tool failed: {0}")]
    Transform(String),

    #[error("Failed to {action} {path}: {source}", path = .path.display())]
    FileOperation {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Failed to open state store at {path}: {source}", path = .path.display())]
    OpenStore {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid run date '{0}': expected YYMMDD or YYYY-MM-DD")]
    InvalidRunDate(String),
}

/// Coarse failure classes used for logging and for deciding how the engine reacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transform,
    Io,
    Store,
    Config,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Transform => write!(f, "transform"),
            ErrorKind::Io => write!(f, "io"),
            ErrorKind::Store => write!(f, "store"),
            ErrorKind::Config => write!(f, "config"),
        }
    }
}

impl AudiochunkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AudiochunkError::Transform(_) => ErrorKind::Transform,
            AudiochunkError::FileOperation { .. }
            | AudiochunkError::Io(_)
            | AudiochunkError::FileNotFound(_) => ErrorKind::Io,
            AudiochunkError::Store(_) | AudiochunkError::OpenStore { .. } => ErrorKind::Store,
            AudiochunkError::Config(_)
            | AudiochunkError::ConfigParse(_)
            | AudiochunkError::InvalidRunDate(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn file_op(
        action: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| AudiochunkError::FileOperation {
            action,
            path,
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, AudiochunkError>;
