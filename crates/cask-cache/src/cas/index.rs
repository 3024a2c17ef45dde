//! Key index for metadata management
//!
//! Keys are hashed into bucket files under `{root}/index-v5`. A bucket is an
//! append-only log: every insert or removal appends one framed record
//! (`\n{sha1(json)}\t{json}`) and nothing is ever rewritten in place. The
//! live entry for a key is the last valid record for it, unless that record
//! is a tombstone. Records that fail their checksum or do not parse are
//! skipped, so a torn trailing write only loses itself.

use cask_core::utils::{hash_key, record_checksum};
use cask_core::{CaskError, Integrity};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use super::store::remove_dir_if_present;
use crate::CacheResult;

/// Directory under the cache root holding index buckets
pub const INDEX_DIR: &str = "index-v5";

/// Live index entry for a key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Key this entry is stored under
    pub key: String,
    /// Integrity of the stored content; acts as the key into the content store
    pub integrity: Integrity,
    /// Unix timestamp in milliseconds when the entry was written
    pub time: u128,
    /// Size of the content in bytes
    pub size: u64,
    /// Arbitrary JSON attached to the entry
    pub metadata: Value,
    /// Raw metadata in binary form, independent of `metadata`
    pub raw_metadata: Option<Vec<u8>>,
}

impl Metadata {
    /// Get the write time as a DateTime
    pub fn time_datetime(&self) -> DateTime<Utc> {
        i64::try_from(self.time)
            .ok()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Current time as unix milliseconds
pub fn now_millis() -> u128 {
    u128::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

/// On-disk form of a record; `integrity: None` marks a tombstone
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BucketRecord {
    key: String,
    integrity: Option<Integrity>,
    time: u128,
    size: u64,
    metadata: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw_metadata: Option<Vec<u8>>,
}

impl BucketRecord {
    fn into_metadata(self) -> Option<Metadata> {
        let integrity = self.integrity?;
        Some(Metadata {
            key: self.key,
            integrity,
            time: self.time,
            size: self.size,
            metadata: self.metadata,
            raw_metadata: self.raw_metadata,
        })
    }
}

impl From<Metadata> for BucketRecord {
    fn from(entry: Metadata) -> Self {
        Self {
            key: entry.key,
            integrity: Some(entry.integrity),
            time: entry.time,
            size: entry.size,
            metadata: entry.metadata,
            raw_metadata: entry.raw_metadata,
        }
    }
}

/// Append-only index mapping keys to content digests
#[derive(Debug, Clone)]
pub struct KeyIndex {
    /// Cache root directory
    root: PathBuf,
}

impl KeyIndex {
    /// Create an index handle for a cache root; nothing is touched on disk
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the bucket file a key hashes into
    pub fn bucket_path(&self, key: &str) -> PathBuf {
        let hashed = hash_key(key);
        self.root
            .join(INDEX_DIR)
            .join(&hashed[0..2])
            .join(&hashed[2..4])
            .join(&hashed[4..])
    }

    /// Append an entry for `entry.key` and return it
    pub fn insert(&self, entry: Metadata) -> CacheResult<Metadata> {
        let bucket = self.bucket_path(&entry.key);
        append_record(&bucket, &BucketRecord::from(entry.clone()))?;
        debug!(key = %entry.key, integrity = %entry.integrity, "indexed entry");
        Ok(entry)
    }

    /// Find the live entry for a key
    pub fn lookup(&self, key: &str) -> CacheResult<Option<Metadata>> {
        let bucket = self.bucket_path(key);
        let found = read_bucket(&bucket)?
            .into_iter()
            .filter(|record| record.key == key)
            .last()
            .and_then(BucketRecord::into_metadata);
        trace!(key, found = found.is_some(), "index lookup");
        Ok(found)
    }

    /// Append a deletion marker for a key
    pub fn tombstone(&self, key: &str) -> CacheResult<()> {
        let bucket = self.bucket_path(key);
        let record = BucketRecord {
            key: key.to_string(),
            integrity: None,
            time: now_millis(),
            size: 0,
            metadata: Value::Null,
            raw_metadata: None,
        };
        append_record(&bucket, &record)?;
        debug!(key, "tombstoned entry");
        Ok(())
    }

    /// Remove every bucket file
    pub fn clear_all(&self) -> CacheResult<()> {
        remove_dir_if_present(&self.root.join(INDEX_DIR))?;
        debug!(root = %self.root.display(), "cleared index");
        Ok(())
    }

    /// Lazily walk every bucket and yield all live entries.
    ///
    /// Each call re-reads from disk. Entries written while the walk is in
    /// progress may or may not be observed.
    pub fn enumerate(&self) -> impl Iterator<Item = CacheResult<Metadata>> {
        WalkDir::new(self.root.join(INDEX_DIR))
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) if entry.file_type().is_file() => Some(Ok(entry.into_path())),
                Ok(_) => None,
                Err(e) if e.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound) => None,
                Err(e) => Some(Err(CaskError::io(
                    "Failed to walk index directory",
                    e.into_io_error()
                        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "directory loop")),
                ))),
            })
            .flat_map(|bucket| match bucket.and_then(|path| read_bucket(&path)) {
                Ok(records) => live_entries(records).into_iter().map(Ok).collect::<Vec<_>>(),
                Err(e) => vec![Err(e)],
            })
    }
}

/// Collapse a bucket's log into its live entries, last write per key wins
fn live_entries(records: Vec<BucketRecord>) -> Vec<Metadata> {
    let mut latest: Vec<BucketRecord> = Vec::new();
    for record in records {
        match latest.iter_mut().find(|seen| seen.key == record.key) {
            Some(seen) => *seen = record,
            None => latest.push(record),
        }
    }
    latest.into_iter().filter_map(BucketRecord::into_metadata).collect()
}

fn append_record(bucket: &Path, record: &BucketRecord) -> CacheResult<()> {
    let json = serde_json::to_string(record).map_err(|e| {
        CaskError::write_failed(
            "Failed to serialize index record",
            io::Error::new(io::ErrorKind::InvalidData, e),
        )
    })?;
    // One write call per record; the leading newline keeps a torn previous
    // record from swallowing this one.
    let line = format!("\n{}\t{}", record_checksum(&json), json);

    if let Some(parent) = bucket.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| CaskError::write_failed("Failed to create index directory", e))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(bucket)
        .map_err(|e| CaskError::write_failed("Failed to open index bucket", e))?;
    file.write_all(line.as_bytes())
        .map_err(|e| CaskError::write_failed("Failed to append index record", e))?;
    file.sync_data()
        .map_err(|e| CaskError::write_failed("Failed to flush index record", e))?;
    Ok(())
}

/// Read every valid record from a bucket, skipping corrupt ones
fn read_bucket(bucket: &Path) -> CacheResult<Vec<BucketRecord>> {
    let raw = match fs::read(bucket) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(CaskError::io(
                format!("Failed to read index bucket {}", bucket.display()),
                e,
            ))
        },
    };

    let content = String::from_utf8_lossy(&raw);
    let records = content
        .split('\n')
        .filter(|line| !line.is_empty())
        .filter_map(|line| match parse_record(bucket, line) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "skipping corrupt index record");
                None
            },
        })
        .collect();
    Ok(records)
}

fn parse_record(bucket: &Path, line: &str) -> CacheResult<BucketRecord> {
    let corrupt = |reason: String| CaskError::IndexCorrupt {
        bucket: bucket.display().to_string(),
        reason,
    };

    let (checksum, json) = line
        .split_once('\t')
        .ok_or_else(|| corrupt("missing checksum separator".to_string()))?;
    if record_checksum(json) != checksum {
        return Err(corrupt("checksum mismatch".to_string()));
    }
    serde_json::from_str(json).map_err(|e| corrupt(format!("invalid record: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cas::hash::hash_bytes;
    use cask_core::Algorithm;
    use serde_json::json;
    use tempfile::tempdir;

    fn entry(key: &str, content: &[u8]) -> Metadata {
        Metadata {
            key: key.to_string(),
            integrity: hash_bytes(Algorithm::Sha256, content),
            time: now_millis(),
            size: content.len() as u64,
            metadata: json!({ "origin": "test" }),
            raw_metadata: None,
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let temp_dir = tempdir().unwrap();
        let index = KeyIndex::new(temp_dir.path());

        let inserted = index.insert(entry("greeting", b"hello")).unwrap();
        let found = index.lookup("greeting").unwrap().unwrap();
        assert_eq!(found, inserted);
        assert_eq!(found.metadata["origin"], "test");
    }

    #[test]
    fn test_lookup_missing_key() {
        let temp_dir = tempdir().unwrap();
        let index = KeyIndex::new(temp_dir.path());
        assert!(index.lookup("nothing").unwrap().is_none());
    }

    #[test]
    fn test_latest_record_wins() {
        let temp_dir = tempdir().unwrap();
        let index = KeyIndex::new(temp_dir.path());

        index.insert(entry("k", b"first")).unwrap();
        let second = index.insert(entry("k", b"second")).unwrap();
        assert_eq!(index.lookup("k").unwrap().unwrap().integrity, second.integrity);
    }

    #[test]
    fn test_tombstone_hides_entry_until_reinsert() {
        let temp_dir = tempdir().unwrap();
        let index = KeyIndex::new(temp_dir.path());

        index.insert(entry("k", b"v1")).unwrap();
        index.tombstone("k").unwrap();
        assert!(index.lookup("k").unwrap().is_none());

        let again = index.insert(entry("k", b"v2")).unwrap();
        assert_eq!(index.lookup("k").unwrap().unwrap(), again);
    }

    #[test]
    fn test_truncated_trailing_record_is_ignored() {
        let temp_dir = tempdir().unwrap();
        let index = KeyIndex::new(temp_dir.path());

        let first = index.insert(entry("k", b"good")).unwrap();
        index.insert(entry("k", b"torn")).unwrap();

        let bucket = index.bucket_path("k");
        let raw = fs::read(&bucket).unwrap();
        fs::write(&bucket, &raw[..raw.len() - 10]).unwrap();

        assert_eq!(index.lookup("k").unwrap().unwrap(), first);
    }

    #[test]
    fn test_garbage_line_does_not_break_later_records() {
        let temp_dir = tempdir().unwrap();
        let index = KeyIndex::new(temp_dir.path());

        index.insert(entry("k", b"one")).unwrap();
        let bucket = index.bucket_path("k");
        let mut file = OpenOptions::new().append(true).open(&bucket).unwrap();
        file.write_all(b"\nnot a record at all").unwrap();
        file.write_all(b"\ndeadbeef\t{\"key\":\"k\"}").unwrap();
        drop(file);

        let later = index.insert(entry("k", b"two")).unwrap();
        assert_eq!(index.lookup("k").unwrap().unwrap(), later);
    }

    #[test]
    fn test_parse_record_reports_corruption() {
        let bucket = Path::new("bucket");
        let err = parse_record(bucket, "no-tab-here").unwrap_err();
        assert!(matches!(err, CaskError::IndexCorrupt { .. }));

        let err = parse_record(bucket, "0000\t{}").unwrap_err();
        assert!(matches!(err, CaskError::IndexCorrupt { .. }));
    }

    #[test]
    fn test_enumerate_yields_live_entries() {
        let temp_dir = tempdir().unwrap();
        let index = KeyIndex::new(temp_dir.path());

        index.insert(entry("a", b"1")).unwrap();
        index.insert(entry("b", b"2")).unwrap();
        index.insert(entry("b", b"3")).unwrap();
        index.insert(entry("c", b"4")).unwrap();
        index.tombstone("c").unwrap();

        let mut keys: Vec<String> = index.enumerate().map(|e| e.unwrap().key).collect();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);

        let b = index.enumerate().map(Result::unwrap).find(|e| e.key == "b").unwrap();
        assert_eq!(b.integrity, hash_bytes(Algorithm::Sha256, b"3"));
    }

    #[test]
    fn test_enumerate_empty_cache() {
        let temp_dir = tempdir().unwrap();
        let index = KeyIndex::new(temp_dir.path());
        assert_eq!(index.enumerate().count(), 0);
    }

    #[test]
    fn test_clear_all() {
        let temp_dir = tempdir().unwrap();
        let index = KeyIndex::new(temp_dir.path());

        index.insert(entry("a", b"1")).unwrap();
        index.clear_all().unwrap();
        assert!(index.lookup("a").unwrap().is_none());
        assert_eq!(index.enumerate().count(), 0);
    }

    #[test]
    fn test_raw_metadata_round_trip() {
        let temp_dir = tempdir().unwrap();
        let index = KeyIndex::new(temp_dir.path());

        let mut with_raw = entry("raw", b"bytes");
        with_raw.raw_metadata = Some(vec![0, 1, 2, 255]);
        index.insert(with_raw).unwrap();
        assert_eq!(
            index.lookup("raw").unwrap().unwrap().raw_metadata,
            Some(vec![0, 1, 2, 255])
        );
    }

    #[test]
    fn test_time_datetime() {
        let mut e = entry("t", b"x");
        e.time = 1_700_000_000_000;
        assert_eq!(e.time_datetime().timestamp(), 1_700_000_000);
    }
}
