//! A cache handle carrying its root and write defaults

use cask_config::CacheConfig;
use cask_core::{Algorithm, Integrity};
use std::path::{Path, PathBuf};

use crate::CacheResult;
use crate::cas::Metadata;
use crate::{get, ls, put, rm};

/// Handle to one cache root.
///
/// Every method delegates to the free functions in [`put`], [`get`], [`rm`]
/// and [`ls`]; handles are cheap to clone and hold no open files.
#[derive(Debug, Clone, PartialEq)]
pub struct Cache {
    root: PathBuf,
    algorithm: Algorithm,
    verify_copies: bool,
}

impl Cache {
    /// Handle for `root` with the default algorithm and verified copies
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            algorithm: Algorithm::default(),
            verify_copies: true,
        }
    }

    /// Handle built from resolved configuration
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            root: config.root.clone().into_std_path_buf(),
            algorithm: config.algorithm,
            verify_copies: config.verify_copies,
        }
    }

    /// Use `algorithm` for content written through this handle
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Write options preloaded with this handle's algorithm
    pub fn write_opts(&self) -> put::WriteOpts {
        put::WriteOpts::new().algorithm(self.algorithm)
    }

    pub fn write_sync<K: AsRef<str>, D: AsRef<[u8]>>(&self, key: K, data: D) -> CacheResult<Integrity> {
        put::write_sync_with_algo(self.algorithm, &self.root, key, data)
    }

    pub fn write_hash_sync<D: AsRef<[u8]>>(&self, data: D) -> CacheResult<Integrity> {
        put::write_hash_sync_with_algo(self.algorithm, &self.root, data)
    }

    pub fn read_sync<K: AsRef<str>>(&self, key: K) -> CacheResult<Vec<u8>> {
        get::read_sync(&self.root, key)
    }

    pub fn read_hash_sync(&self, sri: &Integrity) -> CacheResult<Vec<u8>> {
        get::read_hash_sync(&self.root, sri)
    }

    pub fn exists_sync(&self, sri: &Integrity) -> bool {
        get::exists_sync(&self.root, sri)
    }

    pub fn metadata_sync<K: AsRef<str>>(&self, key: K) -> CacheResult<Option<Metadata>> {
        get::metadata_sync(&self.root, key)
    }

    /// Copy keyed content out, verified unless the handle disables it
    pub fn copy_sync<K: AsRef<str>, Q: AsRef<Path>>(&self, key: K, to: Q) -> CacheResult<u64> {
        if self.verify_copies {
            get::copy_sync(&self.root, key, to)
        } else {
            get::copy_unchecked_sync(&self.root, key, to)
        }
    }

    /// Copy content out by digest, verified unless the handle disables it
    pub fn copy_hash_sync<Q: AsRef<Path>>(&self, sri: &Integrity, to: Q) -> CacheResult<u64> {
        if self.verify_copies {
            get::copy_hash_sync(&self.root, sri, to)
        } else {
            get::copy_hash_unchecked_sync(&self.root, sri, to)
        }
    }

    pub fn remove_sync<K: AsRef<str>>(&self, key: K) -> CacheResult<()> {
        rm::remove_sync(&self.root, key)
    }

    pub fn remove_hash_sync(&self, sri: &Integrity) -> CacheResult<()> {
        rm::remove_hash_sync(&self.root, sri)
    }

    pub fn clear_sync(&self) -> CacheResult<()> {
        rm::clear_sync(&self.root)
    }

    pub fn list_sync(&self) -> impl Iterator<Item = CacheResult<Metadata>> {
        ls::list_sync(self.root.clone())
    }

    pub async fn write<K: AsRef<str>, D: AsRef<[u8]>>(&self, key: K, data: D) -> CacheResult<Integrity> {
        put::write_with_algo(self.algorithm, &self.root, key, data).await
    }

    pub async fn read<K: AsRef<str>>(&self, key: K) -> CacheResult<Vec<u8>> {
        get::read(&self.root, key).await
    }

    pub async fn copy<K: AsRef<str>, Q: AsRef<Path>>(&self, key: K, to: Q) -> CacheResult<u64> {
        if self.verify_copies {
            get::copy(&self.root, key, to).await
        } else {
            get::copy_unchecked(&self.root, key, to).await
        }
    }

    pub async fn remove<K: AsRef<str>>(&self, key: K) -> CacheResult<()> {
        rm::remove(&self.root, key).await
    }

    pub async fn list(&self) -> CacheResult<Vec<Metadata>> {
        ls::list(&self.root).await
    }
}
