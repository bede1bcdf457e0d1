use chrono::Timelike;
use redb::{Database, TableDefinition};
use vault_core::ledger::Ledger;
use vault_core::version::{FileRecord, Version};
use vault_core::Error;

fn version(message: &str, files: &[(&str, &[&str])]) -> Version {
    let mut ver = Version { message: message.to_string(), ..Default::default() };
    for (name, chunks) in files {
        ver.files.insert(
            name.to_string(),
            FileRecord {
                name: name.to_string(),
                chunks: chunks.iter().map(|c| c.to_string()).collect(),
            },
        );
    }
    ver
}

#[test]
fn numbering_is_gapless_across_reopen() {
    let td = tempfile::tempdir().unwrap();
    let path = td.path().join(".collection");
    {
        let ledger = Ledger::create(&path).unwrap();
        ledger.init_meta("memory:r", Some(4096)).unwrap();
        assert_eq!(ledger.max_version().unwrap(), None);
        for i in 0..3u64 {
            assert_eq!(ledger.store_version(&version(&format!("m{i}"), &[])).unwrap(), i);
        }
    }
    let ledger = Ledger::open(&path).unwrap();
    assert_eq!(ledger.max_version().unwrap(), Some(2));
    assert_eq!(ledger.store_version(&version("m3", &[])).unwrap(), 3);
    assert_eq!(ledger.store_version(&version("m4", &[])).unwrap(), 4);

    let msgs: Vec<String> = ledger.versions().unwrap().into_iter().map(|v| v.message).collect();
    assert_eq!(msgs, vec!["m0", "m1", "m2", "m3", "m4"]);
}

#[test]
fn stored_version_reads_back() {
    let td = tempfile::tempdir().unwrap();
    let ledger = Ledger::create(&td.path().join(".collection")).unwrap();
    ledger.init_meta("file:/srv/r", Some(4096)).unwrap();
    let mut ver = version("snap", &[("a.txt", &["c1", "c2"][..]), ("dir/empty", &[][..])]);
    ver.created = Some(chrono::Utc::now().with_nanosecond(0).unwrap());
    let n = ledger.store_version(&ver).unwrap();

    let back = ledger.version(n).unwrap();
    assert_eq!(back, ver);
    assert_eq!(ledger.remote().unwrap(), "file:/srv/r");
    assert_eq!(ledger.chunk_size().unwrap(), Some(4096));
    assert!(matches!(ledger.version(n + 1), Err(Error::NoSuchVersion(1))));
}

#[test]
fn empty_ledger_has_no_versions() {
    let td = tempfile::tempdir().unwrap();
    let ledger = Ledger::create(&td.path().join(".collection")).unwrap();
    assert!(ledger.versions().unwrap().is_empty());
    assert!(matches!(ledger.version(0), Err(Error::NoSuchVersion(0))));
    assert!(matches!(ledger.remote(), Err(Error::CorruptedLedger(_))));
    assert_eq!(ledger.chunk_size().unwrap(), None);
}

#[test]
fn init_meta_keeps_existing_chunk_size() {
    let td = tempfile::tempdir().unwrap();
    let ledger = Ledger::create(&td.path().join(".collection")).unwrap();
    ledger.init_meta("memory:a", Some(1024)).unwrap();
    ledger.init_meta("memory:b", Some(4096)).unwrap();
    assert_eq!(ledger.chunk_size().unwrap(), Some(1024));
    assert_eq!(ledger.remote().unwrap(), "memory:b");
}

#[test]
fn missing_version_namespace_is_corruption() {
    let td = tempfile::tempdir().unwrap();
    let path = td.path().join(".collection");
    {
        let ledger = Ledger::create(&path).unwrap();
        ledger.init_meta("memory:r", Some(4096)).unwrap();
        for m in ["a", "b", "c"] {
            ledger.store_version(&version(m, &[("f", &["x"][..])])).unwrap();
        }
    }
    {
        let db = Database::open(&path).unwrap();
        let txn = db.begin_write().unwrap();
        let def: TableDefinition<&[u8], &[u8]> = TableDefinition::new("ver1");
        assert!(txn.delete_table(def).unwrap());
        txn.commit().unwrap();
    }
    let ledger = Ledger::open(&path).unwrap();
    let err = ledger.versions().unwrap_err();
    assert!(matches!(err, Error::CorruptedLedger(_)), "{err}");
    assert!(matches!(ledger.version(1), Err(Error::CorruptedLedger(_))));
    assert_eq!(ledger.version(2).unwrap().message, "c");
    // The next number still follows meta, never reusing the hole.
    assert_eq!(ledger.store_version(&version("d", &[])).unwrap(), 3);
}

#[test]
fn malformed_file_record_is_corruption() {
    let td = tempfile::tempdir().unwrap();
    let path = td.path().join(".collection");
    {
        let ledger = Ledger::create(&path).unwrap();
        ledger.init_meta("memory:r", Some(4096)).unwrap();
        ledger.store_version(&version("a", &[("f", &["x"][..])])).unwrap();
    }
    {
        let db = Database::open(&path).unwrap();
        let txn = db.begin_write().unwrap();
        {
            let def: TableDefinition<&[u8], &[u8]> = TableDefinition::new("ver0");
            let mut t = txn.open_table(def).unwrap();
            t.insert(&b"f"[..], &b"[1,2"[..]).unwrap();
        }
        txn.commit().unwrap();
    }
    let ledger = Ledger::open(&path).unwrap();
    let err = ledger.versions().unwrap_err();
    assert!(err.to_string().contains("invalid version 0"), "{err}");
}

#[test]
fn locked_read_sees_version_and_rejects_unknown() {
    let td = tempfile::tempdir().unwrap();
    let ledger = Ledger::create(&td.path().join(".collection")).unwrap();
    ledger.init_meta("memory:r", Some(4096)).unwrap();
    ledger.store_version(&version("only", &[("f", &["x"][..])])).unwrap();

    let files = ledger.with_version_locked(0, |v| Ok(v.files.len())).unwrap();
    assert_eq!(files, 1);
    let err = ledger.with_version_locked(5, |_| Ok(())).unwrap_err();
    assert!(matches!(err, Error::NoSuchVersion(5)));
    // An error from the closure propagates and leaves the ledger untouched.
    let err = ledger
        .with_version_locked(0, |_| -> vault_core::Result<()> { Err(Error::UnsafePath("x".into())) })
        .unwrap_err();
    assert!(matches!(err, Error::UnsafePath(_)));
    assert_eq!(ledger.max_version().unwrap(), Some(0));
}
