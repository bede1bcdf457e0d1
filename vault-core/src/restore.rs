use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::chunker;
use crate::error::{Error, IoResultExt, Result};
use crate::path_safety::resolve_under;
use crate::progress::Progress;
use crate::remote::{RemoteLocation, RemoteStore};
use crate::version::{FileRecord, Version};
use crate::walk::{self, ExclusionSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub files_removed: Vec<String>,
    pub files_written: usize,
    pub chunks_fetched: u64,
    pub bytes_written: u64,
}

/// Where a version gets materialized and how to reach its chunks.
pub struct RestoreTarget<'a> {
    pub dst: &'a Path,
    pub exclusions: &'a ExclusionSet,
    pub ledger_name: &'a str,
    pub store: &'a dyn RemoteStore,
    pub location: &'a RemoteLocation,
    pub cancel: &'a CancelToken,
    pub progress: &'a Progress,
}

/// Make `dst` hold exactly the files of `ver`.
///
/// All ledger paths are checked before the tree is touched. Then every tracked file
/// not in `ver` is deleted, and every file of `ver` is rewritten from its chunks in
/// order; a directory occupying a file's path is removed first. Filesystem changes
/// made before a failure stay in place.
pub fn restore(ver: &Version, target: &RestoreTarget<'_>) -> Result<RestoreReport> {
    let mut resolved: BTreeMap<&str, PathBuf> = BTreeMap::new();
    for name in ver.files.keys() {
        resolved.insert(name, resolve_under(target.dst, name, target.ledger_name)?);
    }

    fs::create_dir_all(target.dst).at(target.dst)?;
    let mut report = RestoreReport { files_removed: prune(ver, target)?, ..Default::default() };

    let total: u64 = ver.files.values().map(|r| r.chunks.len() as u64).sum();
    target.progress.set_stage("restore", total);
    for (name, path) in &resolved {
        let record = &ver.files[*name];
        let (chunks, bytes) = restore_file(path, record, target).map_err(|e| Error::Restore {
            path: name.to_string(),
            source: Box::new(e),
        })?;
        info!(path = %name, chunks, bytes, "restored object");
        report.files_written += 1;
        report.chunks_fetched += chunks;
        report.bytes_written += bytes;
    }
    Ok(report)
}

fn prune(ver: &Version, target: &RestoreTarget<'_>) -> Result<Vec<String>> {
    let mut removed = Vec::new();
    for tf in walk::tracked_files(target.dst, target.exclusions)? {
        if ver.files.contains_key(&tf.rel) {
            continue;
        }
        fs::remove_file(&tf.path).at(&tf.path)?;
        warn!(path = %tf.rel, "removed file not present in version");
        removed.push(tf.rel);
    }
    Ok(removed)
}

fn restore_file(path: &Path, record: &FileRecord, target: &RestoreTarget<'_>) -> Result<(u64, u64)> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).at(parent)?;
    }
    // Pruning already removed every tracked file below it.
    if fs::symlink_metadata(path).is_ok_and(|m| m.is_dir()) {
        fs::remove_dir_all(path).at(path)?;
        warn!(path = %path.display(), "removed directory in place of restored file");
    }
    let mut out = BufWriter::new(File::create(path).at(path)?);
    let mut bytes = 0u64;
    let mut data = Vec::new();
    for sum in &record.chunks {
        data.clear();
        let mut r = target.store.get(&target.location.blob_name(sum), target.cancel)?;
        r.read_to_end(&mut data).at(path)?;
        if chunker::checksum(&data) != *sum {
            return Err(Error::ChunkMismatch { checksum: sum.clone() });
        }
        out.write_all(&data).at(path)?;
        bytes += data.len() as u64;
        target.progress.add_chunk(data.len() as u64);
    }
    out.flush().at(path)?;
    Ok((record.chunks.len() as u64, bytes))
}
