//! Configuration schema (cubedbt.toml)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Model selection predicates
///
/// Every list defaults to empty, meaning "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Path prefixes; a model matches if its path starts with any of them
    #[serde(default)]
    pub paths: Vec<String>,

    /// Tags; a model matches only if it carries all of them
    #[serde(default)]
    pub tags: Vec<String>,

    /// Model names; a model matches if its name is listed
    #[serde(default)]
    pub names: Vec<String>,
}

impl FilterConfig {
    /// True when no predicate is set
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.tags.is_empty() && self.names.is_empty()
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Local manifest path (relative to the project root)
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,

    /// Remote manifest location, takes precedence over `manifest`
    #[serde(default)]
    pub manifest_url: Option<String>,

    /// Text encoding of the manifest file
    #[serde(default)]
    pub encoding: Option<String>,

    /// Directory Cube reads its schema from; templates go to `<schema_path>/cubes`
    #[serde(default = "default_schema_path")]
    pub schema_path: PathBuf,

    /// Substrings; dimensions whose name contains one of them are skipped
    #[serde(default)]
    pub dimension_skips: Vec<String>,

    /// Model selection
    #[serde(default)]
    pub filter: FilterConfig,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

fn default_manifest() -> PathBuf {
    PathBuf::from("target/manifest.json")
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("model")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
            manifest_url: None,
            encoding: None,
            schema_path: default_schema_path(),
            dimension_skips: Vec::new(),
            filter: FilterConfig::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.project_root = std::env::current_dir().unwrap_or_default();
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Manifest path resolved against the project root
    pub fn manifest_path(&self) -> PathBuf {
        self.resolve(&self.manifest)
    }

    /// Output directory resolved against the project root
    pub fn schema_dir(&self) -> PathBuf {
        self.resolve(&self.schema_path)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() || self.project_root.as_os_str().is_empty() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
