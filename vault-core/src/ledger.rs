//! Local metadata ledger: one redb file at the collection root.
//!
//! Tables:
//! - `meta`: `remote` -> remote location string, `version` -> highest committed
//!   version number (decimal), `chunk_size` -> block size (decimal, optional).
//! - `ver<N>`: `\0message`, `\0created` and one key per tracked path whose value is
//!   the JSON-encoded [`FileRecord`](crate::version::FileRecord).

use redb::{Database, ReadTransaction, ReadableTable, TableDefinition, TableError, TableHandle};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, IoResultExt, Result};
use crate::version::Version;

const META: TableDefinition<&str, &str> = TableDefinition::new("meta");
const KEY_REMOTE: &str = "remote";
const KEY_VERSION: &str = "version";
const KEY_CHUNK_SIZE: &str = "chunk_size";

type EntryTable<'a> = TableDefinition<'a, &'static [u8], &'static [u8]>;

fn version_table_name(n: u64) -> String {
    format!("ver{n}")
}

pub struct Ledger {
    db: Database,
    path: PathBuf,
}

impl Ledger {
    /// Open `path`, creating an empty ledger if the file does not exist.
    pub fn create(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;
        Ok(Self { db, path: path.to_path_buf() })
    }

    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::open(path)?;
        Ok(Self { db, path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record the remote location. `chunk_size` is written only when given and not
    /// already present, so an adopted ledger keeps the size it was created with.
    pub fn init_meta(&self, remote: &str, chunk_size: Option<usize>) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut meta = txn.open_table(META)?;
            meta.insert(KEY_REMOTE, remote)?;
            if let Some(size) = chunk_size {
                let present = meta.get(KEY_CHUNK_SIZE)?.is_some();
                if !present {
                    meta.insert(KEY_CHUNK_SIZE, size.to_string().as_str())?;
                }
            }
        }
        txn.commit()?;
        Ok(())
    }

    pub fn remote(&self) -> Result<String> {
        let txn = self.db.begin_read()?;
        meta_get(&txn, KEY_REMOTE)?.ok_or_else(|| Error::corrupted("no remote in meta"))
    }

    pub fn chunk_size(&self) -> Result<Option<usize>> {
        let txn = self.db.begin_read()?;
        match meta_get(&txn, KEY_CHUNK_SIZE)? {
            None => Ok(None),
            Some(s) => match s.parse::<usize>() {
                Ok(n) if n > 0 => Ok(Some(n)),
                _ => Err(Error::corrupted(format!("bad chunk_size {s:?}"))),
            },
        }
    }

    /// Highest committed version number, `None` for an empty ledger.
    pub fn max_version(&self) -> Result<Option<u64>> {
        let txn = self.db.begin_read()?;
        read_max(&txn)
    }

    /// Commit `ver` as version `max + 1` (or 0), atomically with the `meta` update.
    pub fn store_version(&self, ver: &Version) -> Result<u64> {
        let entries = ver.to_entries()?;
        let txn = self.db.begin_write()?;
        let n = {
            let mut meta = txn.open_table(META)?;
            let n = match meta.get(KEY_VERSION)? {
                Some(cur) => parse_number(cur.value())? + 1,
                None => 0,
            };
            let name = version_table_name(n);
            if txn.list_tables()?.any(|h| h.name() == name) {
                return Err(Error::corrupted(format!("{name} exists but is not recorded in meta")));
            }
            {
                let def: EntryTable = TableDefinition::new(&name);
                let mut table = txn.open_table(def)?;
                for (k, v) in &entries {
                    table.insert(k.as_slice(), v.as_slice())?;
                }
            }
            meta.insert(KEY_VERSION, n.to_string().as_str())?;
            n
        };
        txn.commit()?;
        info!(version = n, message = %ver.message, files = ver.files.len(), "stored version");
        Ok(n)
    }

    /// All versions `0..=max`, oldest first. A gap is corruption and fails the whole read.
    pub fn versions(&self) -> Result<Vec<Version>> {
        let txn = self.db.begin_read()?;
        let Some(max) = read_max(&txn)? else {
            return Ok(Vec::new());
        };
        (0..=max)
            .map(|n| {
                read_version(&txn, n)?
                    .ok_or_else(|| Error::corrupted(format!("missing version {n} (max {max})")))
            })
            .collect()
    }

    pub fn version(&self, n: u64) -> Result<Version> {
        let txn = self.db.begin_read()?;
        match (read_version(&txn, n)?, read_max(&txn)?) {
            (Some(ver), Some(max)) if n <= max => Ok(ver),
            (None, Some(max)) if n <= max => {
                Err(Error::corrupted(format!("missing version {n} (max {max})")))
            }
            _ => Err(Error::NoSuchVersion(n)),
        }
    }

    /// Run `f` on version `n` while holding the ledger's write transaction.
    ///
    /// Nothing is written; the transaction is aborted afterwards either way.
    pub fn with_version_locked<T>(&self, n: u64, f: impl FnOnce(&Version) -> Result<T>) -> Result<T> {
        let txn = self.db.begin_write()?;
        let name = version_table_name(n);
        if !txn.list_tables()?.any(|h| h.name() == name) {
            txn.abort()?;
            return Err(Error::NoSuchVersion(n));
        }
        let ver = {
            let def: EntryTable = TableDefinition::new(&name);
            let table = txn.open_table(def)?;
            decode_table(n, &table)?
        };
        let out = f(&ver);
        let aborted = txn.abort();
        let out = out?;
        aborted?;
        Ok(out)
    }

    /// Consistent byte copy of the ledger file, for pushing as `<root>/db`.
    pub fn snapshot_bytes(&self) -> Result<Vec<u8>> {
        let _txn = self.db.begin_read()?;
        let bytes = std::fs::read(&self.path).at(&self.path)?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "ledger snapshot");
        Ok(bytes)
    }
}

fn meta_get(txn: &ReadTransaction, key: &str) -> Result<Option<String>> {
    let meta = match txn.open_table(META) {
        Ok(t) => t,
        Err(TableError::TableDoesNotExist(_)) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let value = meta.get(key)?.map(|v| v.value().to_string());
    Ok(value)
}

fn read_max(txn: &ReadTransaction) -> Result<Option<u64>> {
    meta_get(txn, KEY_VERSION)?.map(|s| parse_number(&s)).transpose()
}

fn parse_number(s: &str) -> Result<u64> {
    s.parse().map_err(|_| Error::corrupted(format!("bad version number {s:?}")))
}

fn read_version(txn: &ReadTransaction, n: u64) -> Result<Option<Version>> {
    let name = version_table_name(n);
    let def: EntryTable = TableDefinition::new(&name);
    let table = match txn.open_table(def) {
        Ok(t) => t,
        Err(TableError::TableDoesNotExist(_)) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    decode_table(n, &table).map(Some)
}

fn decode_table<T>(n: u64, table: &T) -> Result<Version>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let mut entries = Vec::new();
    for item in table.iter()? {
        let (k, v) = item?;
        entries.push((k.value().to_vec(), v.value().to_vec()));
    }
    Version::from_entries(entries).map_err(|e| match e {
        Error::CorruptedLedger(msg) => Error::corrupted(format!("invalid version {n}: {msg}")),
        other => other,
    })
}
