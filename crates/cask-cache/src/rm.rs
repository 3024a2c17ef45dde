//! Functions for removing things from the cache

use cask_core::Integrity;
use std::path::Path;
use tracing::debug;

use crate::CacheResult;
use crate::blocking::unblock;
use crate::cas::{ContentStore, KeyIndex};

/// Remove a key from the index.
///
/// A tombstone is appended to the key's bucket, so the key stops resolving
/// while its content stays behind (other keys may still refer to it).
/// Removing a key that was never written succeeds.
pub fn remove_sync<P, K>(cache: P, key: K) -> CacheResult<()>
where
    P: AsRef<Path>,
    K: AsRef<str>,
{
    KeyIndex::new(cache).tombstone(key.as_ref())
}

/// Remove content by digest.
///
/// Index entries pointing at the digest are left alone and report
/// `NotFound` when read. Removing absent content succeeds.
pub fn remove_hash_sync<P: AsRef<Path>>(cache: P, sri: &Integrity) -> CacheResult<()> {
    ContentStore::new(cache).delete(sri)?;
    Ok(())
}

/// Remove every index entry and every blob under the cache root.
///
/// Files outside the cache's own subtrees are not touched.
pub fn clear_sync<P: AsRef<Path>>(cache: P) -> CacheResult<()> {
    let cache = cache.as_ref();
    KeyIndex::new(cache).clear_all()?;
    ContentStore::new(cache).clear()?;
    debug!(root = %cache.display(), "cleared cache");
    Ok(())
}

/// Async form of [`remove_sync`]
pub async fn remove<P, K>(cache: P, key: K) -> CacheResult<()>
where
    P: AsRef<Path>,
    K: AsRef<str>,
{
    let cache = cache.as_ref().to_path_buf();
    let key = key.as_ref().to_string();
    unblock(move || remove_sync(cache, key)).await
}

/// Async form of [`remove_hash_sync`]
pub async fn remove_hash<P: AsRef<Path>>(cache: P, sri: &Integrity) -> CacheResult<()> {
    let cache = cache.as_ref().to_path_buf();
    let sri = sri.clone();
    unblock(move || remove_hash_sync(cache, &sri)).await
}

/// Async form of [`clear_sync`]
pub async fn clear<P: AsRef<Path>>(cache: P) -> CacheResult<()> {
    let cache = cache.as_ref().to_path_buf();
    unblock(move || clear_sync(cache)).await
}
