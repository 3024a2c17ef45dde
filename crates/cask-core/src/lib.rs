//! # cask-core
//!
//! Core types and utilities shared across all cask crates.
//!
//! This crate provides:
//! - `Algorithm` and `Integrity` types for content digests in
//!   Subresource Integrity form (`sha256-<base64>`)
//! - `CaskError` enum for unified error handling
//! - Hashing helpers used for index bucket addressing and record checksums
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Core data types (Algorithm, Integrity, etc.)
//! - `error`: Error types and result aliases
//! - `utils`: Utility functions and helpers

pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{CaskError, CaskResult};
pub use types::{Algorithm, Hash, Integrity};
