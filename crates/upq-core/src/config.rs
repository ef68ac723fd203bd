//! Producer configuration
//!
//! Resolution order: built-in defaults, then an optional TOML file, then
//! environment variables. Command-line overrides are applied by the binary
//! through the `with_*` builders.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use upq_store::{KeySpace, StoreConfig};
use upq_types::LevelTag;

/// Default location of the chunk/plot index file
pub const DEFAULT_INDEX_PATH: &str = "static/cmap_l2.dat";

/// Backend host
pub const ENV_HOST: &str = "UPQ_REDIS_HOST";
/// Backend port
pub const ENV_PORT: &str = "UPQ_REDIS_PORT";
/// Backend ACL user
pub const ENV_USERNAME: &str = "UPQ_REDIS_USERNAME";
/// Backend password
pub const ENV_PASSWORD: &str = "UPQ_REDIS_PASSWORD";
/// Backend password, name used by existing deployments
pub const ENV_PASSWORD_LEGACY: &str = "REDIS_PASSWORD";
/// Backend database index
pub const ENV_DATABASE: &str = "UPQ_REDIS_DB";
/// Index file path
pub const ENV_INDEX_PATH: &str = "UPQ_INDEX_PATH";
/// Chunk key level tag
pub const ENV_LEVEL_TAG: &str = "UPQ_LEVEL_TAG";

/// Producer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpqConfig {
    /// Backend connection
    pub store: StoreConfig,
    /// Chunk/plot index file
    pub index_path: PathBuf,
    /// Level tag for chunk keys
    pub level_tag: LevelTag,
}

impl UpqConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With store settings
    #[inline]
    #[must_use]
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// With index path
    #[inline]
    #[must_use]
    pub fn with_index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = path.into();
        self
    }

    /// With level tag
    #[inline]
    #[must_use]
    pub fn with_level_tag(mut self, level_tag: LevelTag) -> Self {
        self.level_tag = level_tag;
        self
    }

    /// Key space for the configured level tag
    #[must_use]
    pub fn key_space(&self) -> KeySpace {
        KeySpace::new(self.level_tag.clone())
    }

    /// Read a TOML config file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] or [`ConfigError::Toml`]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults or `path`, then the process environment
    ///
    /// # Errors
    /// Returns any file or environment error
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Apply environment overrides read through `lookup`
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidEnv`] for unparsable numbers and
    /// [`ConfigError::InvalidLevelTag`] for an unusable level tag
    pub fn apply_env_with<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_HOST) {
            self.store.host = host;
        }
        if let Some(port) = parse_env(&lookup, ENV_PORT)? {
            self.store.port = port;
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            self.store.username = Some(username);
        }
        if let Some(password) = lookup(ENV_PASSWORD).or_else(|| lookup(ENV_PASSWORD_LEGACY)) {
            self.store.password = Some(password);
        }
        if let Some(db) = parse_env(&lookup, ENV_DATABASE)? {
            self.store.database_index = db;
        }
        if let Some(path) = lookup(ENV_INDEX_PATH) {
            self.index_path = PathBuf::from(path);
        }
        if let Some(tag) = lookup(ENV_LEVEL_TAG) {
            self.level_tag = LevelTag::new(tag)?;
        }
        Ok(self)
    }
}

impl Default for UpqConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            index_path: PathBuf::from(DEFAULT_INDEX_PATH),
            level_tag: LevelTag::default(),
        }
    }
}

fn parse_env<T, F>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::invalid_env(var, raw.as_str()))
        })
        .transpose()
}
