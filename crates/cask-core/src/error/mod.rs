//! Error types and result aliases for cask operations.
//!
//! Provides a unified error type that covers every failure a cache operation
//! can report, from missing entries to on-disk corruption.

use thiserror::Error;

/// Unified error type for all cask operations
#[derive(Error, Debug)]
pub enum CaskError {
    // Lookup errors
    #[error("No cache entry found for {target}")]
    NotFound { target: String },

    // Integrity errors
    #[error("Integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("Size check failed: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("Unsupported integrity algorithm '{algorithm}'")]
    UnsupportedAlgorithm { algorithm: String },

    #[error("Malformed integrity string '{input}': {reason}")]
    MalformedIntegrity { input: String, reason: String },

    // Storage errors
    #[error("Failed to write cache data: {message}")]
    WriteFailed {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt index record in {bucket}: {reason}")]
    IndexCorrupt { bucket: String, reason: String },

    // Config errors
    #[error("Failed to parse cask.toml: {message}")]
    TomlParse { message: String },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for cask operations
pub type CaskResult<T> = Result<T, CaskError>;

impl CaskError {
    /// Create an IO error from std::io::Error
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a write failure from std::io::Error
    pub fn write_failed(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::WriteFailed {
            message: message.into(),
            source,
        }
    }

    /// Create a not-found error for a key or digest
    pub fn not_found(target: impl Into<String>) -> Self {
        Self::NotFound {
            target: target.into(),
        }
    }

    /// Check if this error means the requested data is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, CaskError::NotFound { .. })
    }

    /// Check if this error signals on-disk corruption
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            CaskError::IntegrityMismatch { .. }
                | CaskError::SizeMismatch { .. }
                | CaskError::IndexCorrupt { .. }
        )
    }

    /// Check if this error is recoverable by retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CaskError::Io { .. } | CaskError::WriteFailed { .. })
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            CaskError::IntegrityMismatch { .. } | CaskError::SizeMismatch { .. } => {
                Some("The cached content is corrupt; remove it by hash and write it again")
            },
            CaskError::UnsupportedAlgorithm { .. } => {
                Some("Use one of sha1, sha256, sha384, sha512 or blake3")
            },
            CaskError::WriteFailed { .. } => {
                Some("Check free disk space and permissions on the cache directory")
            },
            _ => None,
        }
    }
}

/// Convert a raw IO error where no extra context is available
impl From<std::io::Error> for CaskError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            message: source.to_string(),
            source,
        }
    }
}
