//! cask.toml configuration parsing and serialization

use camino::{Utf8Path, Utf8PathBuf};
use cask_core::error::CaskError;
use cask_core::Algorithm;
use serde::{Deserialize, Serialize};

use crate::ConfigResult;

/// Complete cask.toml configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaskToml {
    /// Cache settings
    #[serde(default)]
    pub cache: CacheSection,
}

/// The `[cache]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheSection {
    /// Cache root directory; falls back to the platform cache directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<Utf8PathBuf>,

    /// Algorithm used for new content
    #[serde(default)]
    pub algorithm: Algorithm,

    /// Whether copies out of the cache re-verify content
    #[serde(default = "default_verify_copies")]
    pub verify_copies: bool,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            root: None,
            algorithm: Algorithm::default(),
            verify_copies: default_verify_copies(),
        }
    }
}

fn default_verify_copies() -> bool {
    true
}

/// Parse TOML string to CaskToml configuration
pub fn parse_cask_toml(content: &str) -> ConfigResult<CaskToml> {
    let config: CaskToml = toml::from_str(content).map_err(|e| CaskError::TomlParse {
        message: format!("TOML parsing error: {}", e),
    })?;

    validate_config(&config)?;

    Ok(config)
}

/// Serialize CaskToml to TOML string
pub fn serialize_cask_toml(config: &CaskToml) -> ConfigResult<String> {
    toml::to_string_pretty(config).map_err(|e| CaskError::TomlParse {
        message: format!("TOML serialization error: {}", e),
    })
}

/// Validate configuration values that serde cannot check
pub fn validate_config(config: &CaskToml) -> ConfigResult<()> {
    if let Some(root) = &config.cache.root {
        if root.as_str().trim().is_empty() {
            return Err(CaskError::ConfigValidation {
                field: "cache.root".to_string(),
                reason: "Cache root must not be empty".to_string(),
            });
        }
    }

    Ok(())
}

/// Load and parse cask.toml from file path
pub async fn load_from_file(path: &Utf8Path) -> ConfigResult<CaskToml> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CaskError::io(format!("Failed to read {}", path), e))?;

    parse_cask_toml(&content).map_err(|e| match e {
        CaskError::TomlParse { message } => CaskError::TomlParse {
            message: format!("In file {}: {}", path, message),
        },
        CaskError::ConfigValidation { field, reason } => CaskError::ConfigValidation {
            field,
            reason: format!("In file {}: {}", path, reason),
        },
        other => other,
    })
}
