//! Functions for iterating over the cache

use std::path::Path;

use crate::CacheResult;
use crate::blocking::unblock;
use crate::cas::{KeyIndex, Metadata};

/// Lazily list every live entry in the cache.
///
/// Tombstoned keys are skipped. Order is unspecified, and each key appears
/// once with its most recent entry.
pub fn list_sync<P: AsRef<Path>>(cache: P) -> impl Iterator<Item = CacheResult<Metadata>> {
    KeyIndex::new(cache).enumerate()
}

/// Collect every live entry without blocking the runtime
pub async fn list<P: AsRef<Path>>(cache: P) -> CacheResult<Vec<Metadata>> {
    let cache = cache.as_ref().to_path_buf();
    unblock(move || list_sync(cache).collect()).await
}
