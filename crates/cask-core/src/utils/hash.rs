//! Hashing helpers for index addressing and record framing.
//!
//! These are fixed-algorithm helpers used by the key index; content digests
//! go through the cache crate's `IntegrityHasher` instead.

use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Hash a cache key into the hex string used to locate its index bucket
pub fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Checksum prefixed to every serialized index record
pub fn record_checksum(record: &str) -> String {
    hex::encode(Sha1::digest(record.as_bytes()))
}
