use proptest::prelude::*;
use vault_core::chunker::{self, CHUNK_SIZE};
use vault_core::snapshot;
use vault_core::walk::ExclusionSet;

fn pseudo_random(len: usize, seed: u64) -> Vec<u8> {
    fastrand::seed(seed);
    (0..len).map(|_| fastrand::u8(..)).collect()
}

#[test]
fn empty_stream_has_no_chunks() {
    assert!(chunker::chunk(&b""[..], CHUNK_SIZE).unwrap().is_empty());
}

#[test]
fn exact_multiple_has_no_trailing_chunk() {
    let data = pseudo_random(2 * CHUNK_SIZE, 7);
    let sums = chunker::chunk(&data[..], CHUNK_SIZE).unwrap();
    assert_eq!(sums.len(), 2);
    assert_eq!(sums[0], chunker::checksum(&data[..CHUNK_SIZE]));
    assert_eq!(sums[1], chunker::checksum(&data[CHUNK_SIZE..]));
}

#[test]
fn short_tail_is_hashed_unpadded() {
    let data = pseudo_random(CHUNK_SIZE + 10, 9);
    let sums = chunker::chunk(&data[..], CHUNK_SIZE).unwrap();
    assert_eq!(sums.len(), 2);
    assert_eq!(sums[1], chunker::checksum(&data[CHUNK_SIZE..]));
}

#[test]
fn equal_content_equal_checksums() {
    let a = chunker::chunk(&b"hello"[..], CHUNK_SIZE).unwrap();
    let b = chunker::chunk(&b"hello"[..], CHUNK_SIZE).unwrap();
    let c = chunker::chunk(&b"hellp"[..], CHUNK_SIZE).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn chunk_count_is_ceil_of_len(data in proptest::collection::vec(any::<u8>(), 0..5 * CHUNK_SIZE)) {
        let sums = chunker::chunk(&data[..], CHUNK_SIZE).unwrap();
        prop_assert_eq!(sums.len(), data.len().div_ceil(CHUNK_SIZE));
    }

    #[test]
    fn locators_reassemble_every_file(
        a in proptest::collection::vec(any::<u8>(), 0..3 * CHUNK_SIZE),
        tail in proptest::collection::vec(any::<u8>(), 0..CHUNK_SIZE),
    ) {
        let td = tempfile::tempdir().unwrap();
        // b shares a's leading blocks, so some of its chunks resolve through a.txt.
        let mut b = a.clone();
        b.extend_from_slice(&tail);
        std::fs::write(td.path().join("a.txt"), &a).unwrap();
        std::fs::write(td.path().join("b.txt"), &b).unwrap();

        let ex = ExclusionSet::ledger_only(".collection").unwrap();
        let (ver, set) = snapshot::make_version(td.path(), &ex, CHUNK_SIZE).unwrap();
        for (name, want) in [("a.txt", &a), ("b.txt", &b)] {
            let mut got = Vec::new();
            for sum in &ver.files[name].chunks {
                got.extend(snapshot::read_chunk(td.path(), &set[sum], CHUNK_SIZE).unwrap());
            }
            prop_assert_eq!(&got, want);
        }
    }
}
