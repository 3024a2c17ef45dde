//! Content-Addressable Storage implementation
//!
//! This module provides the storage layers the cache engine composes:
//! digest computation and addressing, the blob store, and the key index.

pub mod hash;
pub mod index;
pub mod store;

// Re-export main types
pub use hash::{compute_integrity, content_path, hash_bytes, verify, IntegrityHasher};
pub use index::{KeyIndex, Metadata};
pub use store::{ContentReader, ContentStore, ContentWriter};
