use std::path::PathBuf;

use thiserror::Error;

use crate::domain::EntryId;

#[derive(Error, Debug)]
pub enum GrfError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    /// A filename (or virtual path) has no representation in the archive encoding.
    #[error("bad encoding for `{}'", path.display())]
    Encoding { path: PathBuf },

    /// Ingestion stopped on an unreadable source; `committed` entries were kept and saved.
    #[error("could not read `{}' ({committed} entries committed): {source}", path.display())]
    Ingest {
        path: PathBuf,
        committed: u64,
        #[source]
        source: std::io::Error,
    },

    /// A merge stopped on a failing unit; the `committed` units before it were saved.
    #[error("stopped after {committed} entries: {source}")]
    Interrupted {
        committed: u64,
        #[source]
        source: Box<GrfError>,
    },

    #[error("no such entry: {0}")]
    NotFound(EntryId),

    #[error("archive is opened read-only")]
    ReadOnly,

    #[error("Settings error: {0}")]
    Settings(String),
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, GrfError>;
