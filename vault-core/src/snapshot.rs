use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

use crate::chunker::{self, read_block};
use crate::error::{Error, IoResultExt, Result};
use crate::version::{FileRecord, Version};
use crate::walk::{self, ExclusionSet};

/// Where to read one chunk's bytes from during the current snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkLocator {
    /// Ledger key of the file holding the chunk.
    pub source: String,
    pub offset: u64,
    pub checksum: String,
}

/// Distinct checksums seen in one snapshot walk, each with one locator.
pub type ChunkSet = BTreeMap<String, ChunkLocator>;

/// Chunk every tracked file under `root` and collect the deduplicated chunk set.
///
/// The returned version has no message. A checksum that occurs more than once keeps
/// the locator of its first occurrence in walk order (files in walk order, chunks in
/// file order); later occurrences never replace it, even from another file.
pub fn make_version(
    root: &Path,
    exclusions: &ExclusionSet,
    chunk_size: usize,
) -> Result<(Version, ChunkSet)> {
    let files = walk::tracked_files(root, exclusions)?;

    // Hash in parallel, merge sequentially so the tie-break stays deterministic.
    let chunked: Vec<(walk::TrackedFile, Vec<String>)> = files
        .into_par_iter()
        .map(|tf| -> Result<(walk::TrackedFile, Vec<String>)> {
            let f = File::open(&tf.path).at(&tf.path)?;
            let chunks = chunker::chunk(f, chunk_size).at(&tf.path)?;
            Ok((tf, chunks))
        })
        .collect::<Result<_>>()?;

    let mut ver = Version::default();
    let mut set = ChunkSet::new();
    for (tf, chunks) in chunked {
        for (idx, sum) in chunks.iter().enumerate() {
            if !set.contains_key(sum) {
                set.insert(
                    sum.clone(),
                    ChunkLocator {
                        source: tf.rel.clone(),
                        offset: (chunk_size * idx) as u64,
                        checksum: sum.clone(),
                    },
                );
            }
        }
        debug!(path = %tf.rel, chunks = chunks.len(), "chunked");
        ver.files.insert(tf.rel.clone(), FileRecord { name: tf.rel, chunks });
    }
    Ok((ver, set))
}

/// Read the bytes `loc` points at and check them against its checksum.
pub fn read_chunk(root: &Path, loc: &ChunkLocator, chunk_size: usize) -> Result<Vec<u8>> {
    let path = root.join(&loc.source);
    let mut f = File::open(&path).at(&path)?;
    f.seek(SeekFrom::Start(loc.offset)).at(&path)?;
    let mut buf = vec![0u8; chunk_size];
    let n = read_block(&mut f, &mut buf).at(&path)?;
    buf.truncate(n);
    if n == 0 || chunker::checksum(&buf) != loc.checksum {
        return Err(Error::ChunkMismatch { checksum: loc.checksum.clone() });
    }
    Ok(buf)
}
