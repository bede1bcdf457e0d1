use std::fs;
use vault_core::chunker::{self, CHUNK_SIZE};
use vault_core::snapshot;
use vault_core::walk::{self, ExclusionSet};
use vault_core::Error;

fn ledger_only() -> ExclusionSet {
    ExclusionSet::ledger_only(".collection").unwrap()
}

#[test]
fn identical_files_share_one_chunk() {
    let td = tempfile::tempdir().unwrap();
    fs::write(td.path().join("a.txt"), "hello").unwrap();
    fs::write(td.path().join("b.txt"), "hello").unwrap();

    let (ver, set) = snapshot::make_version(td.path(), &ledger_only(), CHUNK_SIZE).unwrap();
    assert_eq!(ver.files.len(), 2);
    assert_eq!(set.len(), 1);
    assert!(ver.message.is_empty());

    // First file in walk order owns the locator.
    let sum = chunker::checksum(b"hello");
    let loc = &set[&sum];
    assert_eq!(loc.source, "a.txt");
    assert_eq!(loc.offset, 0);
    assert_eq!(ver.files["b.txt"].chunks, vec![sum]);
}

#[test]
fn chunk_set_counts_distinct_checksums_not_file_chunks() {
    let td = tempfile::tempdir().unwrap();
    let block_a = vec![1u8; CHUNK_SIZE];
    let block_b = vec![2u8; CHUNK_SIZE];
    // x = A A B, y = B A, z = A B + tail
    let x = [block_a.clone(), block_a.clone(), block_b.clone()].concat();
    let y = [block_b.clone(), block_a.clone()].concat();
    let z = [block_a.clone(), block_b.clone(), b"tail".to_vec()].concat();
    fs::write(td.path().join("x.bin"), &x).unwrap();
    fs::write(td.path().join("y.bin"), &y).unwrap();
    fs::write(td.path().join("z.bin"), &z).unwrap();

    let (ver, set) = snapshot::make_version(td.path(), &ledger_only(), CHUNK_SIZE).unwrap();
    let per_file: usize = ver.files.values().map(|f| f.chunks.len()).sum();
    assert_eq!(per_file, 3 + 2 + 3);
    assert_eq!(set.len(), 3);

    let b_loc = &set[&chunker::checksum(&block_b)];
    assert_eq!(b_loc.source, "x.bin");
    assert_eq!(b_loc.offset, 2 * CHUNK_SIZE as u64);
}

#[test]
fn nested_files_use_slash_keys_and_ledger_is_skipped() {
    let td = tempfile::tempdir().unwrap();
    fs::create_dir_all(td.path().join("docs/notes")).unwrap();
    fs::create_dir_all(td.path().join("empty")).unwrap();
    fs::write(td.path().join("docs/notes/n.txt"), "n").unwrap();
    fs::write(td.path().join("docs/.collection"), "not the ledger").unwrap();
    fs::write(td.path().join(".collection"), "ledger bytes").unwrap();
    fs::write(td.path().join("zero.txt"), "").unwrap();

    let (ver, _set) = snapshot::make_version(td.path(), &ledger_only(), CHUNK_SIZE).unwrap();
    let names: Vec<&str> = ver.files.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["docs/.collection", "docs/notes/n.txt", "zero.txt"]);
    assert!(ver.files["zero.txt"].chunks.is_empty());
}

#[test]
fn walk_order_is_stable() {
    let td = tempfile::tempdir().unwrap();
    for name in ["c", "a", "b"] {
        fs::write(td.path().join(name), name).unwrap();
    }
    let first: Vec<String> =
        walk::tracked_files(td.path(), &ledger_only()).unwrap().into_iter().map(|t| t.rel).collect();
    assert_eq!(first, vec!["a", "b", "c"]);
}

#[test]
fn exclusion_set_is_exactly_the_ledger() {
    let ex = ledger_only();
    assert_eq!(ex.patterns().len(), 1);
    assert!(ex.is_excluded(".collection"));
    assert!(!ex.is_excluded("sub/.collection"));
    assert!(!ex.is_excluded(".collection.lock"));
    assert!(!ex.is_excluded("x.collection"));
}

#[test]
fn read_chunk_detects_changed_source() {
    let td = tempfile::tempdir().unwrap();
    fs::write(td.path().join("a.txt"), "before").unwrap();
    let (_ver, set) = snapshot::make_version(td.path(), &ledger_only(), CHUNK_SIZE).unwrap();
    fs::write(td.path().join("a.txt"), "after!").unwrap();
    let loc = set.values().next().unwrap();
    let err = snapshot::read_chunk(td.path(), loc, CHUNK_SIZE).unwrap_err();
    assert!(matches!(err, Error::ChunkMismatch { .. }));
}

#[cfg(target_os = "linux")]
#[test]
fn non_utf8_names_are_refused_not_merged() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let td = tempfile::tempdir().unwrap();
    fs::write(td.path().join(OsStr::from_bytes(b"a\xff")), "one").unwrap();
    fs::write(td.path().join(OsStr::from_bytes(b"a\xfe")), "two").unwrap();

    let err = snapshot::make_version(td.path(), &ledger_only(), CHUNK_SIZE).unwrap_err();
    match err {
        Error::Io { source, .. } => assert_eq!(source.kind(), std::io::ErrorKind::InvalidData),
        other => panic!("unexpected error: {other}"),
    }
}
