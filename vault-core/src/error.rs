use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("remote: {0}")]
    Remote(#[from] RemoteError),

    #[error("corrupted ledger: {0}")]
    CorruptedLedger(String),

    #[error("ledger: {0}")]
    Ledger(#[from] redb::Error),

    #[error("no version {0}")]
    NoSuchVersion(u64),

    #[error("invalid version reference '{0}' (must be v0, v1, etc)")]
    InvalidVersionRef(String),

    #[error("no collection at or above {0:?}")]
    NoCollection(PathBuf),

    #[error("collection already exists at {0:?}")]
    CollectionExists(PathBuf),

    #[error("invalid remote '{0}'")]
    InvalidRemote(String),

    #[error("invalid exclusion pattern: {0}")]
    InvalidPattern(String),

    #[error("unsafe path in ledger: {0}")]
    UnsafePath(String),

    #[error("chunk {checksum} does not match its content (source changed while reading?)")]
    ChunkMismatch { checksum: String },

    #[error("cannot restore {path}: {source}")]
    Restore {
        path: String,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    pub fn corrupted(msg: impl Into<String>) -> Self {
        Error::CorruptedLedger(msg.into())
    }
}

/// Attach the failing path to a plain `io::Result`.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}

impl From<walkdir::Error> for Error {
    fn from(e: walkdir::Error) -> Self {
        let path = e.path().map(Path::to_path_buf).unwrap_or_default();
        Error::Io { path, source: io::Error::from(e) }
    }
}

macro_rules! ledger_error {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Error {
            fn from(e: $ty) -> Self {
                Error::Ledger(e.into())
            }
        })*
    };
}

ledger_error!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError
);
