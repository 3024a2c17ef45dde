//! Functions for writing to the cache
//!
//! Every write stages and installs its content before the index record that
//! points at it is appended, so a reader never resolves a key to content
//! that is not there yet.

use cask_core::{Algorithm, CaskError, Integrity};
use serde_json::Value;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::CacheResult;
use crate::blocking::unblock;
use crate::cas::index::now_millis;
use crate::cas::{ContentStore, ContentWriter, KeyIndex, Metadata};

/// Options for writing to the cache
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOpts {
    pub(crate) algorithm: Option<Algorithm>,
    pub(crate) integrity: Option<Integrity>,
    pub(crate) size: Option<u64>,
    pub(crate) time: Option<u128>,
    pub(crate) metadata: Option<Value>,
    pub(crate) raw_metadata: Option<Vec<u8>>,
}

impl WriteOpts {
    /// Create a blank set of options
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash the content with this algorithm (defaults to sha256)
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Expected digest; the write fails with `IntegrityMismatch` if the
    /// content does not match it
    pub fn integrity(mut self, sri: Integrity) -> Self {
        self.integrity = Some(sri);
        self
    }

    /// Expected size; the write fails with `SizeMismatch` otherwise
    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Override the entry timestamp (unix milliseconds)
    pub fn time(mut self, time: u128) -> Self {
        self.time = Some(time);
        self
    }

    /// Arbitrary JSON to attach to the index entry
    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Raw binary metadata to attach to the index entry
    pub fn raw_metadata(mut self, raw_metadata: Vec<u8>) -> Self {
        self.raw_metadata = Some(raw_metadata);
        self
    }

    /// Open a writer that indexes its content under `key` on commit
    pub fn open<P, K>(self, cache: P, key: K) -> CacheResult<Writer>
    where
        P: AsRef<Path>,
        K: AsRef<str>,
    {
        Writer::new(cache.as_ref(), Some(key.as_ref().to_string()), self)
    }

    /// Open a writer that only stores content, without an index entry
    pub fn open_hash<P: AsRef<Path>>(self, cache: P) -> CacheResult<Writer> {
        Writer::new(cache.as_ref(), None, self)
    }

    /// The algorithm content will be hashed with. An expected integrity
    /// takes precedence so the two can be compared.
    fn effective_algorithm(&self) -> Algorithm {
        self.integrity
            .as_ref()
            .map(Integrity::algorithm)
            .or(self.algorithm)
            .unwrap_or_default()
    }
}

/// Streaming writer into the cache
///
/// Nothing becomes visible until [`Writer::commit`] succeeds; dropping the
/// writer discards the staged content.
pub struct Writer {
    cache: PathBuf,
    key: Option<String>,
    opts: WriteOpts,
    content: ContentWriter,
}

impl Writer {
    fn new(cache: &Path, key: Option<String>, opts: WriteOpts) -> CacheResult<Self> {
        let content = ContentStore::new(cache).writer(opts.effective_algorithm())?;
        Ok(Self {
            cache: cache.to_path_buf(),
            key,
            opts,
            content,
        })
    }

    /// Install the content, then index it if a key was given.
    ///
    /// If the index append fails the error is returned and the key stays
    /// unresolved, but the installed blob is kept: another writer may already
    /// have deduplicated against it. The blob is reachable only by digest and
    /// is reused by the next write of the same bytes.
    pub fn commit(self) -> CacheResult<Integrity> {
        let Self {
            cache,
            key,
            opts,
            content,
        } = self;
        let (sri, size) = content.commit_checked(opts.integrity.as_ref(), opts.size)?;

        if let Some(key) = key {
            KeyIndex::new(&cache).insert(Metadata {
                key,
                integrity: sri.clone(),
                time: opts.time.unwrap_or_else(now_millis),
                size,
                metadata: opts.metadata.unwrap_or(Value::Null),
                raw_metadata: opts.raw_metadata,
            })?;
        }
        Ok(sri)
    }
}

impl Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.content.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.content.flush()
    }
}

fn stage_and_commit(mut writer: Writer, data: &[u8]) -> CacheResult<Integrity> {
    writer
        .write_all(data)
        .map_err(|e| CaskError::write_failed("Failed to stage content", e))?;
    writer.commit()
}

/// Write data under a key, hashed with the default algorithm
pub fn write_sync<P, D, K>(cache: P, key: K, data: D) -> CacheResult<Integrity>
where
    P: AsRef<Path>,
    D: AsRef<[u8]>,
    K: AsRef<str>,
{
    write_sync_with_algo(Algorithm::default(), cache, key, data)
}

/// Write data under a key, hashed with `algo`
pub fn write_sync_with_algo<P, D, K>(
    algo: Algorithm,
    cache: P,
    key: K,
    data: D,
) -> CacheResult<Integrity>
where
    P: AsRef<Path>,
    D: AsRef<[u8]>,
    K: AsRef<str>,
{
    let data = data.as_ref();
    let writer = WriteOpts::new()
        .algorithm(algo)
        .size(data.len() as u64)
        .open(cache, key)?;
    stage_and_commit(writer, data)
}

/// Write content only, addressable by the returned digest
pub fn write_hash_sync<P, D>(cache: P, data: D) -> CacheResult<Integrity>
where
    P: AsRef<Path>,
    D: AsRef<[u8]>,
{
    write_hash_sync_with_algo(Algorithm::default(), cache, data)
}

/// Write content only, hashed with `algo`
pub fn write_hash_sync_with_algo<P, D>(algo: Algorithm, cache: P, data: D) -> CacheResult<Integrity>
where
    P: AsRef<Path>,
    D: AsRef<[u8]>,
{
    let data = data.as_ref();
    let writer = WriteOpts::new()
        .algorithm(algo)
        .size(data.len() as u64)
        .open_hash(cache)?;
    stage_and_commit(writer, data)
}

/// Write data with explicit options; `key: None` stores content only
pub fn write_sync_with_opts<P, D>(
    opts: WriteOpts,
    cache: P,
    key: Option<&str>,
    data: D,
) -> CacheResult<Integrity>
where
    P: AsRef<Path>,
    D: AsRef<[u8]>,
{
    let writer = match key {
        Some(key) => opts.open(cache, key)?,
        None => opts.open_hash(cache)?,
    };
    stage_and_commit(writer, data.as_ref())
}

/// Async form of [`write_sync`]
pub async fn write<P, D, K>(cache: P, key: K, data: D) -> CacheResult<Integrity>
where
    P: AsRef<Path>,
    D: AsRef<[u8]>,
    K: AsRef<str>,
{
    write_with_algo(Algorithm::default(), cache, key, data).await
}

/// Async form of [`write_sync_with_algo`]
pub async fn write_with_algo<P, D, K>(
    algo: Algorithm,
    cache: P,
    key: K,
    data: D,
) -> CacheResult<Integrity>
where
    P: AsRef<Path>,
    D: AsRef<[u8]>,
    K: AsRef<str>,
{
    let cache = cache.as_ref().to_path_buf();
    let key = key.as_ref().to_string();
    let data = data.as_ref().to_vec();
    unblock(move || write_sync_with_algo(algo, cache, key, data)).await
}

/// Async form of [`write_hash_sync`]
pub async fn write_hash<P, D>(cache: P, data: D) -> CacheResult<Integrity>
where
    P: AsRef<Path>,
    D: AsRef<[u8]>,
{
    write_hash_with_algo(Algorithm::default(), cache, data).await
}

/// Async form of [`write_hash_sync_with_algo`]
pub async fn write_hash_with_algo<P, D>(algo: Algorithm, cache: P, data: D) -> CacheResult<Integrity>
where
    P: AsRef<Path>,
    D: AsRef<[u8]>,
{
    let cache = cache.as_ref().to_path_buf();
    let data = data.as_ref().to_vec();
    unblock(move || write_hash_sync_with_algo(algo, cache, data)).await
}

/// Async form of [`write_sync_with_opts`]
pub async fn write_with_opts<P, D>(
    opts: WriteOpts,
    cache: P,
    key: Option<&str>,
    data: D,
) -> CacheResult<Integrity>
where
    P: AsRef<Path>,
    D: AsRef<[u8]>,
{
    let cache = cache.as_ref().to_path_buf();
    let key = key.map(str::to_string);
    let data = data.as_ref().to_vec();
    unblock(move || write_sync_with_opts(opts, cache, key.as_deref(), data)).await
}
