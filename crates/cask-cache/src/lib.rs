//! Content-addressable cache store
//!
//! Content is stored once per digest under `content-v2/`, and human keys map
//! to digests through an append-only index under `index-v5/`. Every
//! operation takes the cache root explicitly and comes in two forms: a
//! blocking `*_sync` function and an async twin that runs it on tokio's
//! blocking pool.
//!
//! ```no_run
//! # fn main() -> cask_cache::CacheResult<()> {
//! let sri = cask_cache::write_sync("./my-cache", "greeting", b"hello")?;
//! assert_eq!(cask_cache::read_sync("./my-cache", "greeting")?, b"hello");
//! assert_eq!(cask_cache::read_hash_sync("./my-cache", &sri)?, b"hello");
//! # Ok(())
//! # }
//! ```

mod blocking;
pub mod cache;
pub mod cas;
pub mod get;
pub mod ls;
pub mod put;
pub mod rm;

#[cfg(test)]
mod tests;

// Re-export main types
pub use cache::Cache;
pub use cas::{ContentStore, KeyIndex, Metadata};
pub use cask_core::{Algorithm, CaskError, Hash, Integrity};
pub use get::{
    copy, copy_hash, copy_hash_sync, copy_hash_unchecked, copy_hash_unchecked_sync, copy_sync,
    copy_unchecked, copy_unchecked_sync, exists, exists_sri, exists_sri_sync, exists_sync,
    metadata, metadata_sync, read, read_hash, read_hash_sync, read_sync, Reader,
};
pub use ls::{list, list_sync};
pub use put::{
    write, write_hash, write_hash_sync, write_hash_sync_with_algo, write_hash_with_algo,
    write_sync, write_sync_with_algo, write_sync_with_opts, write_with_algo, write_with_opts,
    WriteOpts, Writer,
};
pub use rm::{clear, clear_sync, remove, remove_hash, remove_hash_sync, remove_sync};
pub use serde_json::Value;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CaskError>;
