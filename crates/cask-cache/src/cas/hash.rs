//! Content digests and digest-derived addressing
//!
//! This module provides the streaming IntegrityHasher and the mapping
//! from an integrity digest to its location in the content subtree.

use blake3::Hasher as Blake3Hasher;
use cask_core::{Algorithm, CaskError, Integrity};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::CacheResult;

/// Directory under the cache root holding content blobs
pub const CONTENT_DIR: &str = "content-v2";

enum HasherState {
    Sha1(Sha1),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
    Blake3(Box<Blake3Hasher>),
}

/// Incremental digest computation for a single algorithm
pub struct IntegrityHasher {
    algorithm: Algorithm,
    state: HasherState,
    bytes: u64,
}

impl IntegrityHasher {
    /// Create a hasher for the given algorithm
    pub fn new(algorithm: Algorithm) -> Self {
        let state = match algorithm {
            Algorithm::Sha1 => HasherState::Sha1(Sha1::new()),
            Algorithm::Sha256 => HasherState::Sha256(Sha256::new()),
            Algorithm::Sha384 => HasherState::Sha384(Sha384::new()),
            Algorithm::Sha512 => HasherState::Sha512(Sha512::new()),
            Algorithm::Blake3 => HasherState::Blake3(Box::new(Blake3Hasher::new())),
        };
        Self {
            algorithm,
            state,
            bytes: 0,
        }
    }

    /// Feed more bytes into the digest
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            HasherState::Sha1(h) => h.update(data),
            HasherState::Sha256(h) => h.update(data),
            HasherState::Sha384(h) => h.update(data),
            HasherState::Sha512(h) => h.update(data),
            HasherState::Blake3(h) => {
                h.update(data);
            },
        }
        self.bytes += data.len() as u64;
    }

    /// Number of bytes hashed so far
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes
    }

    /// Algorithm this hasher computes
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Finish hashing and produce the integrity digest
    pub fn finish(self) -> Integrity {
        let algorithm = self.algorithm;
        match self.state {
            HasherState::Sha1(h) => Integrity::from_bytes(algorithm, &h.finalize()),
            HasherState::Sha256(h) => Integrity::from_bytes(algorithm, &h.finalize()),
            HasherState::Sha384(h) => Integrity::from_bytes(algorithm, &h.finalize()),
            HasherState::Sha512(h) => Integrity::from_bytes(algorithm, &h.finalize()),
            HasherState::Blake3(h) => Integrity::from_bytes(algorithm, h.finalize().as_bytes()),
        }
    }
}

impl Write for IntegrityHasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Compute the digest of in-memory content
pub fn hash_bytes(algorithm: Algorithm, data: &[u8]) -> Integrity {
    let mut hasher = IntegrityHasher::new(algorithm);
    hasher.update(data);
    hasher.finish()
}

/// Compute the digest of a stream without buffering it
pub fn compute_integrity<R: Read>(mut reader: R, algorithm: Algorithm) -> CacheResult<Integrity> {
    let mut hasher = IntegrityHasher::new(algorithm);
    io::copy(&mut reader, &mut hasher)
        .map_err(|e| CaskError::io("Failed to read content for hashing", e))?;
    Ok(hasher.finish())
}

/// Recompute a stream's digest and compare it against `expected`
pub fn verify<R: Read>(reader: R, expected: &Integrity) -> CacheResult<bool> {
    let actual = compute_integrity(reader, expected.algorithm())?;
    Ok(expected.matches(&actual).is_some())
}

/// Get the storage path for a digest
///
/// Blobs live at `{root}/content-v2/{algo}/{hex[0..2]}/{hex[2..4]}/{hex[4..]}`,
/// keyed by the strongest hash in the integrity. A digest that does not
/// decode to the algorithm's length has no path and yields `MalformedIntegrity`.
pub fn content_path(root: &Path, sri: &Integrity) -> CacheResult<PathBuf> {
    let (algorithm, hex) = sri.to_hex()?;
    Ok(root
        .join(CONTENT_DIR)
        .join(algorithm.as_str())
        .join(&hex[0..2])
        .join(&hex[2..4])
        .join(&hex[4..]))
}
