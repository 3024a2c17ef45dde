//! Utility functions and helpers.

pub mod hash;

pub use hash::{hash_key, record_checksum};
