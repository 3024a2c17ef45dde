//! CAS store implementation
//!
//! This module provides the ContentStore, which owns every blob file in the
//! content subtree. Blobs are staged in `{root}/tmp`, hashed while they are
//! written, and installed at their digest path with a no-clobber rename.

use cask_core::{Algorithm, CaskError, Integrity};
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, trace};

use super::hash::{content_path, IntegrityHasher, CONTENT_DIR};
use crate::CacheResult;

/// Directory under the cache root holding staging files
pub const TMP_DIR: &str = "tmp";

/// Content-addressable blob storage under a cache root
#[derive(Debug, Clone)]
pub struct ContentStore {
    /// Cache root directory
    root: PathBuf,
}

impl ContentStore {
    /// Create a store handle for a cache root; nothing is touched on disk
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the root path of the cache
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the storage path for a digest
    pub fn blob_path(&self, sri: &Integrity) -> CacheResult<PathBuf> {
        content_path(&self.root, sri)
    }

    /// Check if content exists in the store without opening it.
    ///
    /// A malformed digest is reported as absent.
    pub fn has(&self, sri: &Integrity) -> bool {
        self.blob_path(sri).map(|path| path.is_file()).unwrap_or(false)
    }

    /// Start staging new content hashed with `algorithm`
    pub fn writer(&self, algorithm: Algorithm) -> CacheResult<ContentWriter> {
        let tmp_dir = self.root.join(TMP_DIR);
        fs::create_dir_all(&tmp_dir)
            .map_err(|e| CaskError::write_failed("Failed to create staging directory", e))?;
        let staged = NamedTempFile::new_in(&tmp_dir)
            .map_err(|e| CaskError::write_failed("Failed to create staging file", e))?;

        Ok(ContentWriter {
            root: self.root.clone(),
            staged,
            hasher: IntegrityHasher::new(algorithm),
        })
    }

    /// Stream content into the store and return its digest and size
    pub fn put<R: Read>(&self, mut reader: R, algorithm: Algorithm) -> CacheResult<(Integrity, u64)> {
        let mut writer = self.writer(algorithm)?;
        io::copy(&mut reader, &mut writer)
            .map_err(|e| CaskError::write_failed("Failed to stage content", e))?;
        writer.commit()
    }

    /// Open content by digest for verified streaming reads
    pub fn open(&self, sri: &Integrity) -> CacheResult<ContentReader> {
        let path = self.blob_path(sri)?;
        let file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CaskError::not_found(sri.to_string()),
            _ => CaskError::io(format!("Failed to open content file {}", path.display()), e),
        })?;
        trace!(integrity = %sri, "opened content");

        Ok(ContentReader {
            file: BufReader::new(file),
            hasher: IntegrityHasher::new(sri.algorithm()),
            expected: sri.clone(),
        })
    }

    /// Get content by digest, verifying it against the digest
    pub fn get(&self, sri: &Integrity) -> CacheResult<Vec<u8>> {
        let mut reader = self.open(sri)?;
        let mut content = Vec::new();
        reader
            .read_to_end(&mut content)
            .map_err(|e| CaskError::io("Failed to read content file", e))?;
        reader.check()?;
        Ok(content)
    }

    /// Remove a blob. Returns `false` if it was already absent.
    ///
    /// This does not consult the key index: entries still pointing at the
    /// digest will report `NotFound` on their next read.
    pub fn delete(&self, sri: &Integrity) -> CacheResult<bool> {
        let path = self.blob_path(sri)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(integrity = %sri, "removed content");
                Ok(true)
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CaskError::io(
                format!("Failed to remove content file {}", path.display()),
                e,
            )),
        }
    }

    /// Stream verified content into `to`, replacing it atomically.
    ///
    /// The bytes land in a temp file beside `to` and only replace it after
    /// the digest (and `expected_size`, if given) check out.
    pub fn copy_to(&self, sri: &Integrity, to: &Path, expected_size: Option<u64>) -> CacheResult<u64> {
        let mut reader = self.open(sri)?;
        let parent = match to.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)
            .map_err(|e| CaskError::write_failed("Failed to create copy destination directory", e))?;
        let mut staged = NamedTempFile::new_in(&parent)
            .map_err(|e| CaskError::write_failed("Failed to create copy staging file", e))?;

        let copied = io::copy(&mut reader, &mut staged)
            .map_err(|e| CaskError::write_failed("Failed to copy content", e))?;
        reader.check()?;
        if let Some(expected) = expected_size {
            if expected != copied {
                return Err(CaskError::SizeMismatch {
                    expected,
                    actual: copied,
                });
            }
        }

        staged
            .persist(to)
            .map_err(|e| CaskError::write_failed(format!("Failed to install {}", to.display()), e.error))?;
        Ok(copied)
    }

    /// Copy content into `to` without re-verifying its digest
    pub fn copy_unchecked_to(&self, sri: &Integrity, to: &Path) -> CacheResult<u64> {
        let path = self.blob_path(sri)?;
        if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| CaskError::write_failed("Failed to create copy destination directory", e))?;
        }
        fs::copy(&path, to).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound if !path.exists() => CaskError::not_found(sri.to_string()),
            _ => CaskError::write_failed(format!("Failed to copy into {}", to.display()), e),
        })
    }

    /// Remove the whole content subtree and any leftover staging files
    pub fn clear(&self) -> CacheResult<()> {
        for dir in [CONTENT_DIR, TMP_DIR] {
            remove_dir_if_present(&self.root.join(dir))?;
        }
        debug!(root = %self.root.display(), "cleared content store");
        Ok(())
    }
}

pub(crate) fn remove_dir_if_present(dir: &Path) -> CacheResult<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CaskError::io(format!("Failed to remove {}", dir.display()), e)),
    }
}

/// Content being staged into the store
///
/// Dropping a writer without committing removes its staging file.
pub struct ContentWriter {
    root: PathBuf,
    staged: NamedTempFile,
    hasher: IntegrityHasher,
}

impl ContentWriter {
    /// Algorithm the content is being hashed with
    pub fn algorithm(&self) -> Algorithm {
        self.hasher.algorithm()
    }

    /// Number of bytes staged so far
    pub fn bytes_written(&self) -> u64 {
        self.hasher.bytes_hashed()
    }

    /// Install the staged content at its digest path
    pub fn commit(self) -> CacheResult<(Integrity, u64)> {
        self.commit_checked(None, None)
    }

    /// Install the staged content after checking it against expectations.
    ///
    /// On any mismatch the staged file is discarded and nothing is installed.
    pub fn commit_checked(
        self,
        expected_sri: Option<&Integrity>,
        expected_size: Option<u64>,
    ) -> CacheResult<(Integrity, u64)> {
        let Self {
            root,
            staged,
            hasher,
        } = self;
        let size = hasher.bytes_hashed();
        let sri = hasher.finish();

        if let Some(expected) = expected_size {
            if expected != size {
                return Err(CaskError::SizeMismatch {
                    expected,
                    actual: size,
                });
            }
        }
        if let Some(expected) = expected_sri {
            if expected.matches(&sri).is_none() {
                return Err(CaskError::IntegrityMismatch {
                    expected: expected.to_string(),
                    actual: sri.to_string(),
                });
            }
        }

        staged
            .as_file()
            .sync_all()
            .map_err(|e| CaskError::write_failed("Failed to flush staged content", e))?;

        let target = content_path(&root, &sri)?;
        if target.is_file() {
            trace!(integrity = %sri, "content already present, discarding staged copy");
            return Ok((sri, size));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CaskError::write_failed("Failed to create content directory", e))?;
        }

        match staged.persist_noclobber(&target) {
            Ok(_) => debug!(integrity = %sri, size, "installed content"),
            // Another writer installed identical bytes first; keep theirs.
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                trace!(integrity = %sri, "lost install race to identical content");
            },
            Err(e) => {
                return Err(CaskError::write_failed(
                    format!("Failed to install content at {}", target.display()),
                    e.error,
                ))
            },
        }
        Ok((sri, size))
    }
}

impl Write for ContentWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.staged.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.staged.flush()
    }
}

/// Streaming reader that re-hashes content as it is read
pub struct ContentReader {
    file: BufReader<File>,
    hasher: IntegrityHasher,
    expected: Integrity,
}

impl ContentReader {
    /// Number of bytes read so far
    pub fn bytes_read(&self) -> u64 {
        self.hasher.bytes_hashed()
    }

    /// Finish reading and verify the content against its digest.
    ///
    /// Any unread bytes are consumed first so the whole blob is checked.
    pub fn check(mut self) -> CacheResult<Algorithm> {
        io::copy(&mut self, &mut io::sink())
            .map_err(|e| CaskError::io("Failed to read content file", e))?;
        let actual = self.hasher.finish();
        self.expected
            .matches(&actual)
            .ok_or_else(|| CaskError::IntegrityMismatch {
                expected: self.expected.to_string(),
                actual: actual.to_string(),
            })
    }
}

impl Read for ContentReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.file.read(buf)?;
        self.hasher.update(&buf[..read]);
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cas::hash::hash_bytes;
    use tempfile::tempdir;
    use walkdir::WalkDir;

    fn blob_count(root: &Path) -> usize {
        WalkDir::new(root.join(CONTENT_DIR))
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .count()
    }

    fn staging_count(root: &Path) -> usize {
        fs::read_dir(root.join(TMP_DIR)).map(|dir| dir.count()).unwrap_or(0)
    }

    #[test]
    fn test_store_and_retrieve() {
        let temp_dir = tempdir().unwrap();
        let store = ContentStore::new(temp_dir.path());

        let content = b"hello world";
        let (sri, size) = store.put(&content[..], Algorithm::Sha256).unwrap();
        assert_eq!(size, content.len() as u64);
        assert_eq!(sri, hash_bytes(Algorithm::Sha256, content));
        assert_eq!(store.get(&sri).unwrap(), content);
        assert_eq!(staging_count(temp_dir.path()), 0);
    }

    #[test]
    fn test_duplicate_store_keeps_one_blob() {
        let temp_dir = tempdir().unwrap();
        let store = ContentStore::new(temp_dir.path());

        let (first, _) = store.put(&b"same"[..], Algorithm::Sha256).unwrap();
        let (second, _) = store.put(&b"same"[..], Algorithm::Sha256).unwrap();
        assert_eq!(first, second);
        assert_eq!(blob_count(temp_dir.path()), 1);
        assert_eq!(staging_count(temp_dir.path()), 0);
    }

    #[test]
    fn test_has() {
        let temp_dir = tempdir().unwrap();
        let store = ContentStore::new(temp_dir.path());

        let (sri, _) = store.put(&b"present"[..], Algorithm::Sha1).unwrap();
        assert!(store.has(&sri));
        assert!(!store.has(&hash_bytes(Algorithm::Sha1, b"absent")));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let temp_dir = tempdir().unwrap();
        let store = ContentStore::new(temp_dir.path());

        let err = store.get(&hash_bytes(Algorithm::Sha256, b"nope")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_corrupted_blob_fails_verification() {
        let temp_dir = tempdir().unwrap();
        let store = ContentStore::new(temp_dir.path());

        let (sri, _) = store.put(&b"pristine"[..], Algorithm::Sha512).unwrap();
        fs::write(store.blob_path(&sri).unwrap(), b"tampered").unwrap();

        let err = store.get(&sri).unwrap_err();
        assert!(matches!(err, CaskError::IntegrityMismatch { .. }));
        // Corrupt content is surfaced, never deleted.
        assert!(store.has(&sri));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let temp_dir = tempdir().unwrap();
        let store = ContentStore::new(temp_dir.path());

        let (sri, _) = store.put(&b"doomed"[..], Algorithm::Sha256).unwrap();
        assert!(store.delete(&sri).unwrap());
        assert!(!store.delete(&sri).unwrap());
        assert!(!store.has(&sri));
    }

    #[test]
    fn test_commit_checked_rejects_mismatch() {
        let temp_dir = tempdir().unwrap();
        let store = ContentStore::new(temp_dir.path());

        let mut writer = store.writer(Algorithm::Sha256).unwrap();
        writer.write_all(b"actual").unwrap();
        let wrong = hash_bytes(Algorithm::Sha256, b"expected");
        let err = writer.commit_checked(Some(&wrong), None).unwrap_err();
        assert!(matches!(err, CaskError::IntegrityMismatch { .. }));

        let mut writer = store.writer(Algorithm::Sha256).unwrap();
        writer.write_all(b"actual").unwrap();
        let err = writer.commit_checked(None, Some(3)).unwrap_err();
        assert!(matches!(err, CaskError::SizeMismatch { expected: 3, actual: 6 }));

        assert_eq!(blob_count(temp_dir.path()), 0);
        assert_eq!(staging_count(temp_dir.path()), 0);
    }

    #[test]
    fn test_dropped_writer_leaves_nothing() {
        let temp_dir = tempdir().unwrap();
        let store = ContentStore::new(temp_dir.path());

        let mut writer = store.writer(Algorithm::Sha256).unwrap();
        writer.write_all(b"abandoned").unwrap();
        assert_eq!(writer.bytes_written(), 9);
        drop(writer);

        assert_eq!(blob_count(temp_dir.path()), 0);
        assert_eq!(staging_count(temp_dir.path()), 0);
    }

    #[test]
    fn test_copy_to() {
        let temp_dir = tempdir().unwrap();
        let store = ContentStore::new(temp_dir.path().join("cache"));

        let (sri, size) = store.put(&b"copy me"[..], Algorithm::Sha256).unwrap();
        let dest = temp_dir.path().join("out").join("copy.txt");
        assert_eq!(store.copy_to(&sri, &dest, Some(size)).unwrap(), size);
        assert_eq!(fs::read(&dest).unwrap(), b"copy me");

        let unchecked = temp_dir.path().join("out").join("unchecked.txt");
        assert_eq!(store.copy_unchecked_to(&sri, &unchecked).unwrap(), size);
        assert_eq!(fs::read(&unchecked).unwrap(), b"copy me");
    }

    #[test]
    fn test_copy_to_rejects_size_mismatch() {
        let temp_dir = tempdir().unwrap();
        let store = ContentStore::new(temp_dir.path());

        let (sri, _) = store.put(&b"twelve bytes"[..], Algorithm::Sha256).unwrap();
        let dest = temp_dir.path().join("dest.bin");
        let err = store.copy_to(&sri, &dest, Some(1)).unwrap_err();
        assert!(matches!(err, CaskError::SizeMismatch { .. }));
        assert!(!dest.exists());
    }

    #[test]
    fn test_copy_missing_is_not_found() {
        let temp_dir = tempdir().unwrap();
        let store = ContentStore::new(temp_dir.path());
        let sri = hash_bytes(Algorithm::Sha256, b"ghost");
        let dest = temp_dir.path().join("dest.bin");

        assert!(store.copy_to(&sri, &dest, None).unwrap_err().is_not_found());
        assert!(store.copy_unchecked_to(&sri, &dest).unwrap_err().is_not_found());
    }

    #[test]
    fn test_clear() {
        let temp_dir = tempdir().unwrap();
        let store = ContentStore::new(temp_dir.path());

        let (sri, _) = store.put(&b"temporary"[..], Algorithm::Sha256).unwrap();
        store.clear().unwrap();
        assert!(!store.has(&sri));
        // Clearing an already empty store is fine.
        store.clear().unwrap();
    }
}
