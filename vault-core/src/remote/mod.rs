//! Remote blob store boundary.
//!
//! Layout below a remote root:
//! ```text
//! <root>/db                 whole-file copy of the local ledger
//! <root>/blobs/<checksum>   one immutable object per distinct chunk
//! ```

mod local;
mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;

use std::collections::HashMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::{Error, Result};

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("transport error on {name}: {source}")]
    Transport {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl RemoteError {
    pub fn transport(name: &str, source: io::Error) -> Self {
        RemoteError::Transport { name: name.to_string(), source }
    }
}

/// Capability set the core needs from an object store.
pub trait RemoteStore: Send + Sync {
    /// `Ok(false)` when the object is absent; any other failure is an error.
    fn exists(&self, name: &str, cancel: &CancelToken) -> std::result::Result<bool, RemoteError>;

    fn get(
        &self,
        name: &str,
        cancel: &CancelToken,
    ) -> std::result::Result<Box<dyn Read + Send>, RemoteError>;

    /// Create or wholly replace `name`.
    fn put(
        &self,
        name: &str,
        data: &mut dyn Read,
        size_hint: u64,
        cancel: &CancelToken,
    ) -> std::result::Result<(), RemoteError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Backend {
    Local,
    Memory,
}

/// Parsed remote location string: `file:<path>`, `memory:<name>` or a bare path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteLocation {
    pub backend: Backend,
    pub root: String,
    raw: String,
}

impl RemoteLocation {
    pub fn parse(s: &str) -> Result<Self> {
        let (backend, root) = if let Some(rest) = s.strip_prefix("file:") {
            (Backend::Local, rest)
        } else if let Some(rest) = s.strip_prefix("memory:") {
            (Backend::Memory, rest)
        } else if has_scheme(s) {
            return Err(Error::InvalidRemote(format!("{s} (unsupported backend)")));
        } else {
            (Backend::Local, s)
        };
        let root = if root.len() > 1 { root.trim_end_matches('/') } else { root };
        if root.is_empty() {
            return Err(Error::InvalidRemote(format!("{s} (empty root)")));
        }
        Ok(Self { backend, root: root.to_string(), raw: s.to_string() })
    }

    /// The string this location was parsed from (what the ledger stores).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Resolve a relative local root against `base` so the location no longer depends
    /// on the working directory of the process using it.
    pub fn anchored(self, base: &Path) -> Result<Self> {
        if self.backend != Backend::Local || Path::new(&self.root).is_absolute() {
            return Ok(self);
        }
        let joined = base.join(&self.root);
        let root = joined
            .to_str()
            .ok_or_else(|| {
                Error::InvalidRemote(format!("{} (path is not valid UTF-8)", joined.display()))
            })?
            .to_string();
        Ok(Self { backend: Backend::Local, raw: format!("file:{root}"), root })
    }

    pub fn meta_name(&self) -> String {
        format!("{}/db", self.root)
    }

    pub fn blob_name(&self, checksum: &str) -> String {
        format!("{}/blobs/{}", self.root, checksum)
    }
}

// `s3:bucket`, `sftp:host/dir` ... but not `C:\dir` or a plain relative path.
fn has_scheme(s: &str) -> bool {
    match s.find(':') {
        Some(i) if i > 1 => s[..i].bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-'),
        _ => false,
    }
}

/// Backend handles for one process, keyed by remote location string.
///
/// Owned by the collection; every push and restore borrows its stores from here.
pub struct RemotePool {
    base: PathBuf,
    stores: Mutex<HashMap<String, Arc<dyn RemoteStore>>>,
}

impl RemotePool {
    /// Relative local roots resolve against the current directory.
    pub fn new() -> Result<Self> {
        let base = std::env::current_dir().map_err(|e| Error::io(".", e))?;
        Ok(Self::with_base(base))
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base, stores: Mutex::new(HashMap::new()) }
    }

    /// Directory relative local paths are resolved against.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Use `store` for `location` instead of building a backend on first use.
    pub fn register(&self, location: &RemoteLocation, store: Arc<dyn RemoteStore>) {
        let mut stores = self.stores.lock().unwrap_or_else(|e| e.into_inner());
        stores.insert(location.as_str().to_string(), store);
    }

    pub fn store(&self, location: &RemoteLocation) -> Arc<dyn RemoteStore> {
        let mut stores = self.stores.lock().unwrap_or_else(|e| e.into_inner());
        stores
            .entry(location.as_str().to_string())
            .or_insert_with(|| {
                debug!(remote = location.as_str(), backend = ?location.backend, "opening remote");
                let store: Arc<dyn RemoteStore> = match location.backend {
                    Backend::Local => Arc::new(LocalStore::new(self.base.clone())),
                    Backend::Memory => Arc::new(MemoryStore::new()),
                };
                store
            })
            .clone()
    }
}
