use rayon::prelude::*;
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::path::Path;

use crate::chunker;
use crate::error::{IoResultExt, Result};
use crate::version::{FileRecord, Version};
use crate::walk::{self, ExclusionSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiffStatus {
    Deleted,
    New,
    Modified,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffEntry {
    pub path: String,
    pub status: DiffStatus,
}

impl DiffEntry {
    fn new(path: &str, status: DiffStatus) -> Self {
        Self { path: path.to_string(), status }
    }
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.status {
            DiffStatus::Deleted => "deleted",
            DiffStatus::New => "unversioned",
            DiffStatus::Modified => "modified",
        };
        write!(f, "{label}: {}", self.path)
    }
}

/// Compare the tree under `root` with `ver`.
///
/// Every tracked file is re-chunked; file metadata is never trusted. New and modified
/// entries come in walk order, deleted entries follow in path order. Unchanged files
/// produce nothing.
pub fn diff(
    root: &Path,
    exclusions: &ExclusionSet,
    chunk_size: usize,
    ver: &Version,
) -> Result<Vec<DiffEntry>> {
    let files = walk::tracked_files(root, exclusions)?;

    let walked: Vec<Option<DiffEntry>> = files
        .par_iter()
        .map(|tf| -> Result<Option<DiffEntry>> {
            let status = match ver.files.get(&tf.rel) {
                None => DiffStatus::New,
                Some(record) if is_modified(&tf.path, record, chunk_size)? => DiffStatus::Modified,
                Some(_) => return Ok(None),
            };
            Ok(Some(DiffEntry::new(&tf.rel, status)))
        })
        .collect::<Result<_>>()?;

    let present: HashSet<&str> = files.iter().map(|tf| tf.rel.as_str()).collect();
    let mut out: Vec<DiffEntry> = walked.into_iter().flatten().collect();
    for name in ver.files.keys() {
        if !present.contains(name.as_str()) {
            out.push(DiffEntry::new(name, DiffStatus::Deleted));
        }
    }
    Ok(out)
}

fn is_modified(path: &Path, record: &FileRecord, chunk_size: usize) -> Result<bool> {
    let f = File::open(path).at(path)?;
    let live = chunker::chunk(f, chunk_size).at(path)?;
    Ok(live != record.chunks)
}
