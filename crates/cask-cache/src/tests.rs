//! End-to-end tests for the cache engine

use super::*;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

fn blob_count(root: &Path) -> usize {
    walkdir::WalkDir::new(root.join(cas::hash::CONTENT_DIR))
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .count()
}

#[test]
fn test_greeting_scenario() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();

    let sri = write_sync(root, "greeting", b"hello").unwrap();
    assert_eq!(
        sri.to_string(),
        "sha256-LPJNul+wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ="
    );
    assert_eq!(read_sync(root, "greeting").unwrap(), b"hello");
    assert!(exists_sri_sync(root, &sri.to_string()));

    let entry = metadata_sync(root, "greeting").unwrap().unwrap();
    assert_eq!(entry.integrity, sri);
    assert_eq!(entry.size, 5);

    remove_sync(root, "greeting").unwrap();
    assert!(read_sync(root, "greeting").unwrap_err().is_not_found());
    // Content outlives the key.
    assert!(exists_sync(root, &sri));
}

#[test]
fn test_same_content_under_two_keys_is_stored_once() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();

    let a = write_sync(root, "a", b"x").unwrap();
    let b = write_sync(root, "b", b"x").unwrap();
    assert_eq!(a, b);
    assert_eq!(blob_count(root), 1);

    remove_sync(root, "a").unwrap();
    assert_eq!(read_sync(root, "b").unwrap(), b"x");
}

#[test]
fn test_removal_is_idempotent() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    let sri = write_sync(root, "k", b"twice").unwrap();

    remove_sync(root, "k").unwrap();
    remove_sync(root, "k").unwrap();
    remove_hash_sync(root, &sri).unwrap();
    remove_hash_sync(root, &sri).unwrap();
    assert!(!exists_sync(root, &sri));
}

#[test]
fn test_corrupt_bucket_line_is_isolated() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    write_sync(root, "k", b"first").unwrap();

    // Simulate a torn append followed by a later good write.
    let bucket = KeyIndex::new(root).bucket_path("k");
    let mut file = OpenOptions::new().append(true).open(&bucket).unwrap();
    file.write_all(b"\ndeadbeef\t{\"key\":\"k\",\"integ").unwrap();
    drop(file);

    assert_eq!(read_sync(root, "k").unwrap(), b"first");
    write_sync(root, "k", b"second").unwrap();
    assert_eq!(read_sync(root, "k").unwrap(), b"second");
    assert_eq!(list_sync(root).count(), 1);
}

#[test]
fn test_corrupt_content_does_not_affect_other_entries() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    let bad = write_sync(root, "bad", b"will rot").unwrap();
    write_sync(root, "good", b"stays fine").unwrap();

    fs::write(ContentStore::new(root).blob_path(&bad).unwrap(), b"rotten").unwrap();
    assert!(matches!(
        read_sync(root, "bad"),
        Err(CaskError::IntegrityMismatch { .. })
    ));
    assert_eq!(read_sync(root, "good").unwrap(), b"stays fine");
}

#[test]
fn test_malformed_integrity_values_are_rejected_cleanly() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    write_sync(root, "k", b"present").unwrap();

    let short = Integrity::from_bytes(Algorithm::Sha256, &[1u8]);
    let garbage = Integrity::from_hash(Hash {
        algorithm: Algorithm::Sha256,
        digest: "***".to_string(),
    });
    for sri in [short, garbage] {
        assert!(!exists_sync(root, &sri));
        assert!(!exists_sri_sync(root, &sri.to_string()));
        for err in [
            read_hash_sync(root, &sri).unwrap_err(),
            remove_hash_sync(root, &sri).unwrap_err(),
            copy_hash_sync(root, &sri, root.join("out")).unwrap_err(),
            copy_hash_unchecked_sync(root, &sri, root.join("out")).unwrap_err(),
        ] {
            assert!(matches!(err, CaskError::MalformedIntegrity { .. }));
        }
    }
    assert_eq!(read_sync(root, "k").unwrap(), b"present");
}

#[test]
fn test_clear_then_reuse() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    write_sync(root, "k", b"old").unwrap();

    clear_sync(root).unwrap();
    assert_eq!(list_sync(root).count(), 0);
    assert_eq!(blob_count(root), 0);

    write_sync(root, "k", b"new").unwrap();
    assert_eq!(read_sync(root, "k").unwrap(), b"new");
}

#[test]
fn test_concurrent_writers_of_same_content() {
    let temp_dir = tempdir().unwrap();
    let root = Arc::new(temp_dir.path().to_path_buf());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let root = Arc::clone(&root);
            thread::spawn(move || write_sync(root.as_path(), format!("key-{}", i), b"shared"))
        })
        .collect();
    let digests: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().unwrap())
        .collect();

    assert!(digests.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(blob_count(&root), 1);
    assert_eq!(list_sync(root.as_path()).count(), 8);
    // Nothing is left behind in staging.
    let staged = fs::read_dir(root.join(cas::store::TMP_DIR)).unwrap().count();
    assert_eq!(staged, 0);
}

#[test]
fn test_concurrent_writers_of_same_key() {
    let temp_dir = tempdir().unwrap();
    let root = Arc::new(temp_dir.path().to_path_buf());

    let handles: Vec<_> = (0..8u8)
        .map(|i| {
            let root = Arc::clone(&root);
            thread::spawn(move || write_sync(root.as_path(), "contended", [i; 64]))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    // One of the writes wins; the result is never a mix.
    let data = read_sync(root.as_path(), "contended").unwrap();
    assert_eq!(data.len(), 64);
    assert!(data.iter().all(|byte| *byte == data[0]));
}

#[tokio::test]
async fn test_async_and_sync_forms_agree() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();

    let via_async = write(root, "async", b"same bytes").await.unwrap();
    let via_sync = write_sync(root, "sync", b"same bytes").unwrap();
    assert_eq!(via_async, via_sync);

    assert_eq!(read(root, "sync").await.unwrap(), read_sync(root, "async").unwrap());
    assert_eq!(list(root).await.unwrap().len(), 2);

    clear(root).await.unwrap();
    assert!(!exists(root, &via_async).await);
}

mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use proptest::test_runner::Config as ProptestConfig;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]
        #[test]
        fn write_read_round_trip_property(
            key in "[a-zA-Z0-9/:._-]{1,40}",
            content in prop::collection::vec(any::<u8>(), 0..4096),
        ) {
            let temp_dir = tempdir().unwrap();
            let sri = write_sync(temp_dir.path(), &key, &content).unwrap();
            prop_assert_eq!(read_sync(temp_dir.path(), &key).unwrap(), content.clone());
            prop_assert_eq!(read_hash_sync(temp_dir.path(), &sri).unwrap(), content);
        }

        #[test]
        fn dedup_property(
            content in prop::collection::vec(any::<u8>(), 0..1024),
            copies in 1usize..5,
        ) {
            let temp_dir = tempdir().unwrap();
            for i in 0..copies {
                write_sync(temp_dir.path(), format!("k{}", i), &content).unwrap();
            }
            prop_assert_eq!(blob_count(temp_dir.path()), 1);
        }
    }
}
