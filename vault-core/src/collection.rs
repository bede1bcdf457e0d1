use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cancel::CancelToken;
use crate::chunker::CHUNK_SIZE;
use crate::config::CollectionConfig;
use crate::diff::{self, DiffEntry};
use crate::error::{Error, IoResultExt, Result};
use crate::ledger::Ledger;
use crate::progress::Progress;
use crate::remote::{RemoteLocation, RemotePool};
use crate::restore::{self, RestoreReport, RestoreTarget};
use crate::snapshot::{self, ChunkLocator, ChunkSet};
use crate::sync::{self, PushReport};
use crate::version::Version;
use crate::walk::ExclusionSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    pub version: u64,
    pub files: usize,
    pub push: PushReport,
}

/// A working directory, its ledger and the remote it backs up to.
pub struct Collection {
    root: PathBuf,
    ledger: Ledger,
    remote: RemoteLocation,
    pool: RemotePool,
    chunk_size: usize,
    exclusions: ExclusionSet,
    config: CollectionConfig,
}

impl Collection {
    /// Create the ledger in `root`, adopting `<remote>/db` when the remote has one.
    pub fn create_at(
        root: &Path,
        remote: &str,
        pool: RemotePool,
        cancel: &CancelToken,
        config: CollectionConfig,
    ) -> Result<Self> {
        let location = RemoteLocation::parse(remote)?.anchored(&absolute_root(root, &pool))?;
        let ledger_path = root.join(&config.ledger_name);
        if ledger_path.exists() {
            return Err(Error::CollectionExists(root.to_path_buf()));
        }
        let store = pool.store(&location);
        let adopted = sync::pull_meta(store.as_ref(), &location, &ledger_path, cancel)?;
        let ledger = Ledger::create(&ledger_path)?;
        let fresh_size = if adopted { None } else { Some(config.chunk_size) };
        ledger.init_meta(location.as_str(), fresh_size)?;
        info!(root = %root.display(), remote, adopted, "created collection");
        Self::from_ledger(root, ledger, pool, config)
    }

    pub fn open(root: &Path, pool: RemotePool, config: CollectionConfig) -> Result<Self> {
        let ledger_path = root.join(&config.ledger_name);
        if !ledger_path.is_file() {
            return Err(Error::NoCollection(root.to_path_buf()));
        }
        let ledger = Ledger::open(&ledger_path)?;
        Self::from_ledger(root, ledger, pool, config)
    }

    /// Open the collection containing `start`: the nearest ancestor holding a ledger.
    pub fn discover(start: &Path, pool: RemotePool, config: CollectionConfig) -> Result<Self> {
        let start = start.canonicalize().at(start)?;
        let mut cur = start.as_path();
        loop {
            if cur.join(&config.ledger_name).is_file() {
                return Self::open(cur, pool, config);
            }
            match cur.parent() {
                Some(p) => cur = p,
                None => return Err(Error::NoCollection(start.clone())),
            }
        }
    }

    fn from_ledger(
        root: &Path,
        ledger: Ledger,
        pool: RemotePool,
        config: CollectionConfig,
    ) -> Result<Self> {
        let remote = ledger.remote()?;
        let remote = RemoteLocation::parse(&remote)
            .map_err(|_| Error::corrupted(format!("invalid remote '{remote}' in meta")))?
            .anchored(&absolute_root(root, &pool))?;
        let chunk_size = ledger.chunk_size()?.unwrap_or(CHUNK_SIZE);
        let exclusions = ExclusionSet::ledger_only(&config.ledger_name)?;
        Ok(Self { root: root.to_path_buf(), ledger, remote, pool, chunk_size, exclusions, config })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn remote(&self) -> &RemoteLocation {
        &self.remote
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    pub fn make_version(&self) -> Result<(Version, ChunkSet)> {
        snapshot::make_version(&self.root, &self.exclusions, self.chunk_size)
    }

    pub fn read_chunk(&self, loc: &ChunkLocator) -> Result<Vec<u8>> {
        snapshot::read_chunk(&self.root, loc, self.chunk_size)
    }

    pub fn store_version(&self, ver: &Version) -> Result<u64> {
        self.ledger.store_version(ver)
    }

    /// Snapshot the tree, upload unseen chunks, commit the version, push the ledger.
    ///
    /// Chunks go up before the ledger commit, so a committed version never refers to
    /// a blob the remote lacks.
    pub fn commit_version(&self, message: &str, cancel: &CancelToken) -> Result<CommitReport> {
        let (mut ver, set) = self.make_version()?;
        ver.message = message.to_string();
        ver.created = Some(Utc::now());

        let store = self.pool.store(&self.remote);
        let progress = Progress::new(self.config.progress);
        progress.start();
        let push = sync::push_chunks(
            &self.root,
            &set,
            self.chunk_size,
            store.as_ref(),
            &self.remote,
            cancel,
            &progress,
        );
        progress.stop();
        let push = push?;

        let version = self.ledger.store_version(&ver)?;
        sync::push_meta(&self.ledger, store.as_ref(), &self.remote, cancel)?;
        Ok(CommitReport { version, files: ver.files.len(), push })
    }

    pub fn push_meta(&self, cancel: &CancelToken) -> Result<u64> {
        let store = self.pool.store(&self.remote);
        sync::push_meta(&self.ledger, store.as_ref(), &self.remote, cancel)
    }

    pub fn versions(&self) -> Result<Vec<Version>> {
        self.ledger.versions()
    }

    pub fn version(&self, n: u64) -> Result<Version> {
        self.ledger.version(n)
    }

    pub fn latest_version(&self) -> Result<Option<(u64, Version)>> {
        match self.ledger.max_version()? {
            None => Ok(None),
            Some(n) => Ok(Some((n, self.ledger.version(n)?))),
        }
    }

    pub fn diff(&self, ver: &Version) -> Result<Vec<DiffEntry>> {
        diff::diff(&self.root, &self.exclusions, self.chunk_size, ver)
    }

    /// Diff against the newest version; with no versions every file is new.
    pub fn diff_latest(&self) -> Result<Vec<DiffEntry>> {
        let ver = self.latest_version()?.map(|(_, v)| v).unwrap_or_default();
        self.diff(&ver)
    }

    /// Materialize version `n` into `dst` while holding the ledger transaction.
    pub fn restore_version(
        &self,
        n: u64,
        dst: &Path,
        cancel: &CancelToken,
    ) -> Result<RestoreReport> {
        let store = self.pool.store(&self.remote);
        let progress = Progress::new(self.config.progress);
        self.ledger.with_version_locked(n, |ver| {
            let target = RestoreTarget {
                dst,
                exclusions: &self.exclusions,
                ledger_name: &self.config.ledger_name,
                store: store.as_ref(),
                location: &self.remote,
                cancel,
                progress: &progress,
            };
            progress.start();
            let report = restore::restore(ver, &target);
            progress.stop();
            let report = report?;
            info!(version = n, message = %ver.message, "successfully restored");
            Ok(report)
        })
    }

    /// Restore the newest version into the collection root; `None` if there is none.
    pub fn restore_last_version(&self, cancel: &CancelToken) -> Result<Option<RestoreReport>> {
        match self.ledger.max_version()? {
            None => Ok(None),
            Some(n) => self.restore_version(n, &self.root, cancel).map(Some),
        }
    }
}

fn absolute_root(root: &Path, pool: &RemotePool) -> PathBuf {
    if root.is_absolute() {
        root.to_path_buf()
    } else {
        pool.base().join(root)
    }
}
