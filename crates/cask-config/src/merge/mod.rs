//! Configuration layering, fallback logic, and environment overrides
//!
//! Precedence, lowest to highest: built-in defaults, the nearest cask.toml
//! (searched from the working directory upwards), then `CASK_*` environment
//! variables.

use camino::{Utf8Path, Utf8PathBuf};
use cask_core::error::CaskError;
use cask_core::Algorithm;
use std::collections::HashMap;
use tracing::debug;

use crate::toml::CaskToml;
use crate::ConfigResult;

/// Name of the project configuration file
pub const CONFIG_FILE: &str = "cask.toml";

/// Overrides the cache root
pub const ENV_CACHE_DIR: &str = "CASK_CACHE_DIR";
/// Overrides the default algorithm
pub const ENV_ALGORITHM: &str = "CASK_ALGORITHM";
/// Overrides copy verification (`true`/`false`, `1`/`0`)
pub const ENV_VERIFY_COPIES: &str = "CASK_VERIFY_COPIES";

/// Fully resolved cache settings
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Cache root directory
    pub root: Utf8PathBuf,
    /// Algorithm used for new content
    pub algorithm: Algorithm,
    /// Whether copies out of the cache re-verify content
    pub verify_copies: bool,
}

impl CacheConfig {
    /// Settings for an explicit root with every other value defaulted
    pub fn with_root(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            algorithm: Algorithm::default(),
            verify_copies: true,
        }
    }
}

/// Where the file layer of a resolved configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// No cask.toml was found
    Defaults,
    /// Project cask.toml file
    ProjectToml(Utf8PathBuf),
}

/// Main configuration loading interface
pub struct ConfigLoader {
    /// Current working directory
    cwd: Utf8PathBuf,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new(cwd: Utf8PathBuf) -> Self {
        Self { cwd }
    }

    /// Find the nearest cask.toml, walking up from the working directory
    pub fn find_config_file(&self) -> Option<Utf8PathBuf> {
        self.cwd
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE))
            .find(|path| path.is_file())
    }

    /// Resolve settings from defaults, cask.toml, and the process environment
    pub async fn resolve(&self) -> ConfigResult<(CacheConfig, ConfigSource)> {
        self.resolve_with_env(&collect_env_overrides()).await
    }

    /// Resolve settings using an explicit set of environment overrides
    pub async fn resolve_with_env(
        &self,
        env_overrides: &HashMap<String, String>,
    ) -> ConfigResult<(CacheConfig, ConfigSource)> {
        let (file, source) = match self.find_config_file() {
            Some(path) => {
                let file = crate::toml::load_from_file(&path).await?;
                (file, ConfigSource::ProjectToml(path))
            },
            None => (CaskToml::default(), ConfigSource::Defaults),
        };

        let root = match (&file.cache.root, &source) {
            // Relative roots are anchored at the directory holding cask.toml.
            (Some(root), ConfigSource::ProjectToml(path)) if root.is_relative() => path
                .parent()
                .map(|dir| dir.join(root))
                .unwrap_or_else(|| root.clone()),
            (Some(root), _) => root.clone(),
            // Replaced by the override below; skips the platform lookup.
            (None, _) if env_overrides.contains_key(ENV_CACHE_DIR) => Utf8PathBuf::new(),
            (None, _) => default_root()?,
        };

        let mut config = CacheConfig {
            root,
            algorithm: file.cache.algorithm,
            verify_copies: file.cache.verify_copies,
        };
        apply_env_overrides(&mut config, env_overrides)?;

        debug!(root = %config.root, algorithm = %config.algorithm, ?source, "resolved cache config");
        Ok((config, source))
    }
}

/// The platform cache directory joined with `cask`
pub fn default_root() -> ConfigResult<Utf8PathBuf> {
    let cache_dir = dirs::cache_dir().ok_or_else(|| CaskError::ConfigValidation {
        field: "cache_dir".to_string(),
        reason: "Could not determine the platform cache directory".to_string(),
    })?;

    let cache_dir = Utf8PathBuf::try_from(cache_dir).map_err(|e| CaskError::ConfigValidation {
        field: "cache_dir".to_string(),
        reason: format!("Invalid cache directory path: {}", e),
    })?;

    Ok(cache_dir.join("cask"))
}

/// Apply `CASK_*` environment overrides on top of resolved settings
pub fn apply_env_overrides(
    config: &mut CacheConfig,
    overrides: &HashMap<String, String>,
) -> ConfigResult<()> {
    for (key, value) in overrides {
        match key.as_str() {
            ENV_CACHE_DIR => {
                if value.trim().is_empty() {
                    return Err(CaskError::ConfigValidation {
                        field: ENV_CACHE_DIR.to_string(),
                        reason: "Cache root must not be empty".to_string(),
                    });
                }
                config.root = Utf8Path::new(value).to_path_buf();
            },
            ENV_ALGORITHM => {
                config.algorithm = value.parse::<Algorithm>().map_err(|e| CaskError::ConfigValidation {
                    field: ENV_ALGORITHM.to_string(),
                    reason: e.to_string(),
                })?;
            },
            ENV_VERIFY_COPIES => {
                config.verify_copies = parse_bool(value).ok_or_else(|| CaskError::ConfigValidation {
                    field: ENV_VERIFY_COPIES.to_string(),
                    reason: format!("Expected true or false, got '{}'", value),
                })?;
            },
            _ => {
                // Unknown environment variable, ignore
            },
        }
    }

    Ok(())
}

/// Collect environment variable overrides
pub fn collect_env_overrides() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with("CASK_"))
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
