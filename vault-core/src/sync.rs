use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::error::{Error, IoResultExt, Result};
use crate::ledger::Ledger;
use crate::progress::Progress;
use crate::remote::{RemoteError, RemoteLocation, RemoteStore};
use crate::snapshot::{self, ChunkSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    pub chunks_total: usize,
    pub chunks_uploaded: usize,
    pub bytes_uploaded: u64,
}

/// Upload every chunk of `set` the remote does not have yet, one at a time.
///
/// An existence check that fails for any reason other than "absent" aborts the push.
pub fn push_chunks(
    root: &Path,
    set: &ChunkSet,
    chunk_size: usize,
    store: &dyn RemoteStore,
    location: &RemoteLocation,
    cancel: &CancelToken,
    progress: &Progress,
) -> Result<PushReport> {
    let mut report = PushReport { chunks_total: set.len(), ..Default::default() };
    progress.set_stage("upload", set.len() as u64);
    for (sum, loc) in set {
        let name = location.blob_name(sum);
        if store.exists(&name, cancel)? {
            debug!(checksum = %sum, "chunk already present on remote");
            progress.add_chunk(0);
            continue;
        }
        let data = snapshot::read_chunk(root, loc, chunk_size)?;
        store.put(&name, &mut data.as_slice(), data.len() as u64, cancel)?;
        report.chunks_uploaded += 1;
        report.bytes_uploaded += data.len() as u64;
        progress.add_chunk(data.len() as u64);
    }
    info!(
        total = report.chunks_total,
        uploaded = report.chunks_uploaded,
        bytes = report.bytes_uploaded,
        "pushed chunks"
    );
    Ok(report)
}

/// Overwrite `<root>/db` with the whole local ledger.
pub fn push_meta(
    ledger: &Ledger,
    store: &dyn RemoteStore,
    location: &RemoteLocation,
    cancel: &CancelToken,
) -> Result<u64> {
    let bytes = ledger.snapshot_bytes()?;
    let name = location.meta_name();
    store.put(&name, &mut bytes.as_slice(), bytes.len() as u64, cancel)?;
    info!(remote = %name, bytes = bytes.len(), "pushed ledger");
    Ok(bytes.len() as u64)
}

/// Copy `<root>/db` to `dst`. Returns `false` (and writes nothing) if the remote has none.
pub fn pull_meta(
    store: &dyn RemoteStore,
    location: &RemoteLocation,
    dst: &Path,
    cancel: &CancelToken,
) -> Result<bool> {
    let name = location.meta_name();
    let mut r = match store.get(&name, cancel) {
        Ok(r) => r,
        Err(RemoteError::NotFound(_)) => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    let mut tmp_name = dst.as_os_str().to_owned();
    tmp_name.push(".pull");
    let tmp = std::path::PathBuf::from(tmp_name);
    let res = (|| -> Result<u64> {
        let mut f = File::create(&tmp).at(&tmp)?;
        let n = io::copy(&mut r, &mut f).map_err(|e| Error::Remote(RemoteError::transport(&name, e)))?;
        f.flush().at(&tmp)?;
        f.sync_all().at(&tmp)?;
        Ok(n)
    })();
    match res {
        Ok(n) => {
            fs::rename(&tmp, dst).at(dst)?;
            info!(remote = %name, bytes = n, "pulled ledger");
            Ok(true)
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}
