//! Configuration loading for the cask cache
//!
//! This crate handles parsing and validation of cask.toml files and layers
//! them with defaults and environment overrides into a [`CacheConfig`].

pub mod merge;
pub mod toml;

// Re-export main types
pub use merge::{CacheConfig, ConfigLoader, ConfigSource, default_root};
pub use toml::{CacheSection, CaskToml};

use cask_core::error::CaskError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, CaskError>;
