//! Functions for reading from the cache
//!
//! Reads resolve a key through the index (or take a digest directly) and
//! verify content against its digest as it streams. A verification failure
//! is always reported to the caller; corrupt content is never removed here.

use cask_core::{Algorithm, CaskError, Integrity};
use std::io::{self, Read};
use std::path::Path;

use crate::CacheResult;
use crate::blocking::unblock;
use crate::cas::{ContentReader, ContentStore, KeyIndex, Metadata};

fn resolve(cache: &Path, key: &str) -> CacheResult<Metadata> {
    KeyIndex::new(cache)
        .lookup(key)?
        .ok_or_else(|| CaskError::not_found(key))
}

/// Streaming reader over cached content
///
/// Content is re-hashed as it is read; call [`Reader::check`] once done to
/// find out whether it matched its digest.
pub struct Reader {
    content: ContentReader,
    expected_size: Option<u64>,
}

impl Reader {
    /// Open the content indexed under `key`
    pub fn open_sync<P, K>(cache: P, key: K) -> CacheResult<Self>
    where
        P: AsRef<Path>,
        K: AsRef<str>,
    {
        let entry = resolve(cache.as_ref(), key.as_ref())?;
        let content = ContentStore::new(cache).open(&entry.integrity)?;
        Ok(Self {
            content,
            expected_size: Some(entry.size),
        })
    }

    /// Open content directly by digest
    pub fn open_hash_sync<P: AsRef<Path>>(cache: P, sri: &Integrity) -> CacheResult<Self> {
        let content = ContentStore::new(cache).open(sri)?;
        Ok(Self {
            content,
            expected_size: None,
        })
    }

    /// Consume the rest of the content and verify it.
    ///
    /// Returns the algorithm that matched, `IntegrityMismatch` if the bytes
    /// do not hash to the digest, or `SizeMismatch` if they disagree with the
    /// size recorded in the index.
    pub fn check(self) -> CacheResult<Algorithm> {
        let Self {
            mut content,
            expected_size,
        } = self;
        io::copy(&mut content, &mut io::sink())
            .map_err(|e| CaskError::io("Failed to read content file", e))?;
        let actual_size = content.bytes_read();
        let algorithm = content.check()?;
        match expected_size {
            Some(expected) if expected != actual_size => Err(CaskError::SizeMismatch {
                expected,
                actual: actual_size,
            }),
            _ => Ok(algorithm),
        }
    }
}

impl Read for Reader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.content.read(buf)
    }
}

fn read_to_end(mut reader: Reader) -> CacheResult<Vec<u8>> {
    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .map_err(|e| CaskError::io("Failed to read content file", e))?;
    reader.check()?;
    Ok(data)
}

/// Read the content indexed under `key`, verifying it
pub fn read_sync<P, K>(cache: P, key: K) -> CacheResult<Vec<u8>>
where
    P: AsRef<Path>,
    K: AsRef<str>,
{
    read_to_end(Reader::open_sync(cache, key)?)
}

/// Read content by digest, bypassing the index
pub fn read_hash_sync<P: AsRef<Path>>(cache: P, sri: &Integrity) -> CacheResult<Vec<u8>> {
    read_to_end(Reader::open_hash_sync(cache, sri)?)
}

/// Check whether content for a digest is present. Never fails.
pub fn exists_sync<P: AsRef<Path>>(cache: P, sri: &Integrity) -> bool {
    ContentStore::new(cache).has(sri)
}

/// Like [`exists_sync`], taking the digest in string form.
///
/// Malformed or unsupported digest strings simply report `false`.
pub fn exists_sri_sync<P: AsRef<Path>>(cache: P, sri: &str) -> bool {
    sri.parse::<Integrity>()
        .map(|sri| exists_sync(cache, &sri))
        .unwrap_or(false)
}

/// Get the live index entry for a key without touching its content
pub fn metadata_sync<P, K>(cache: P, key: K) -> CacheResult<Option<Metadata>>
where
    P: AsRef<Path>,
    K: AsRef<str>,
{
    KeyIndex::new(cache).lookup(key.as_ref())
}

/// Copy the content indexed under `key` into `to`, verifying it.
///
/// `to` is replaced atomically and only once the content has checked out.
/// Returns the number of bytes copied.
pub fn copy_sync<P, K, Q>(cache: P, key: K, to: Q) -> CacheResult<u64>
where
    P: AsRef<Path>,
    K: AsRef<str>,
    Q: AsRef<Path>,
{
    let entry = resolve(cache.as_ref(), key.as_ref())?;
    ContentStore::new(cache).copy_to(&entry.integrity, to.as_ref(), Some(entry.size))
}

/// Copy content by digest into `to`, verifying it
pub fn copy_hash_sync<P, Q>(cache: P, sri: &Integrity, to: Q) -> CacheResult<u64>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    ContentStore::new(cache).copy_to(sri, to.as_ref(), None)
}

/// Copy the content indexed under `key` into `to` without verification.
///
/// Skips re-hashing for throughput: corrupt content is copied as-is and `to`
/// is written in place rather than swapped in atomically.
pub fn copy_unchecked_sync<P, K, Q>(cache: P, key: K, to: Q) -> CacheResult<u64>
where
    P: AsRef<Path>,
    K: AsRef<str>,
    Q: AsRef<Path>,
{
    let entry = resolve(cache.as_ref(), key.as_ref())?;
    ContentStore::new(cache).copy_unchecked_to(&entry.integrity, to.as_ref())
}

/// Copy content by digest into `to` without verification.
///
/// Same trade-off as [`copy_unchecked_sync`].
pub fn copy_hash_unchecked_sync<P, Q>(cache: P, sri: &Integrity, to: Q) -> CacheResult<u64>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    ContentStore::new(cache).copy_unchecked_to(sri, to.as_ref())
}

/// Async form of [`read_sync`]
pub async fn read<P, K>(cache: P, key: K) -> CacheResult<Vec<u8>>
where
    P: AsRef<Path>,
    K: AsRef<str>,
{
    let cache = cache.as_ref().to_path_buf();
    let key = key.as_ref().to_string();
    unblock(move || read_sync(cache, key)).await
}

/// Async form of [`read_hash_sync`]
pub async fn read_hash<P: AsRef<Path>>(cache: P, sri: &Integrity) -> CacheResult<Vec<u8>> {
    let cache = cache.as_ref().to_path_buf();
    let sri = sri.clone();
    unblock(move || read_hash_sync(cache, &sri)).await
}

/// Async form of [`exists_sync`]
pub async fn exists<P: AsRef<Path>>(cache: P, sri: &Integrity) -> bool {
    let cache = cache.as_ref().to_path_buf();
    let sri = sri.clone();
    unblock(move || Ok(exists_sync(cache, &sri)))
        .await
        .unwrap_or(false)
}

/// Async form of [`exists_sri_sync`]
pub async fn exists_sri<P: AsRef<Path>>(cache: P, sri: &str) -> bool {
    let cache = cache.as_ref().to_path_buf();
    let sri = sri.to_string();
    unblock(move || Ok(exists_sri_sync(cache, &sri)))
        .await
        .unwrap_or(false)
}

/// Async form of [`metadata_sync`]
pub async fn metadata<P, K>(cache: P, key: K) -> CacheResult<Option<Metadata>>
where
    P: AsRef<Path>,
    K: AsRef<str>,
{
    let cache = cache.as_ref().to_path_buf();
    let key = key.as_ref().to_string();
    unblock(move || metadata_sync(cache, key)).await
}

/// Async form of [`copy_sync`]
pub async fn copy<P, K, Q>(cache: P, key: K, to: Q) -> CacheResult<u64>
where
    P: AsRef<Path>,
    K: AsRef<str>,
    Q: AsRef<Path>,
{
    let cache = cache.as_ref().to_path_buf();
    let key = key.as_ref().to_string();
    let to = to.as_ref().to_path_buf();
    unblock(move || copy_sync(cache, key, to)).await
}

/// Async form of [`copy_hash_sync`]
pub async fn copy_hash<P, Q>(cache: P, sri: &Integrity, to: Q) -> CacheResult<u64>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let cache = cache.as_ref().to_path_buf();
    let sri = sri.clone();
    let to = to.as_ref().to_path_buf();
    unblock(move || copy_hash_sync(cache, &sri, to)).await
}

/// Async form of [`copy_unchecked_sync`]
pub async fn copy_unchecked<P, K, Q>(cache: P, key: K, to: Q) -> CacheResult<u64>
where
    P: AsRef<Path>,
    K: AsRef<str>,
    Q: AsRef<Path>,
{
    let cache = cache.as_ref().to_path_buf();
    let key = key.as_ref().to_string();
    let to = to.as_ref().to_path_buf();
    unblock(move || copy_unchecked_sync(cache, key, to)).await
}

/// Async form of [`copy_hash_unchecked_sync`]
pub async fn copy_hash_unchecked<P, Q>(cache: P, sri: &Integrity, to: Q) -> CacheResult<u64>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let cache = cache.as_ref().to_path_buf();
    let sri = sri.clone();
    let to = to.as_ref().to_path_buf();
    unblock(move || copy_hash_unchecked_sync(cache, &sri, to)).await
}
