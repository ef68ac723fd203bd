//! Error types for UPQ Core
//!
//! Provides error handling for:
//! - Dispatch requests (unknown chunks, store failures)
//! - Request state transitions
//! - Configuration loading

use crate::state_machine::DispatchState;
use std::path::PathBuf;
use upq_index::IndexError;
use upq_store::StoreError;
use upq_types::{ChunkId, FlagParseError, IdParseError};

/// Main UPQ error type
#[derive(Debug, thiserror::Error)]
pub enum UpqError {
    /// Index could not be loaded
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// A dispatch request failed
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    /// Store operation outside a dispatch failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Flag text could not be parsed
    #[error("flag error: {0}")]
    Flags(#[from] FlagParseError),
}

impl UpqError {
    /// Whether retrying the same operation can succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Dispatch(e) => e.is_retryable(),
            Self::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Errors for a single chunk-update request
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Chunk has no plots in the index
    #[error("unknown chunk: {0}")]
    UnknownChunk(ChunkId),

    /// Store rejected or never saw the commit
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DispatchError {
    /// Whether the whole dispatch may be retried
    ///
    /// Retrying is safe because duplicate enqueue and pending-add are
    /// absorbed downstream.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_retryable())
    }
}

/// State machine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    /// Transition not allowed from the current state
    #[error("illegal state transition: {from} -> {to}")]
    IllegalTransition {
        /// Current state
        from: DispatchState,
        /// Requested state
        to: DispatchState,
    },
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid config {path}: {source}")]
    Toml {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },

    /// Environment variable holds an unusable value
    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv {
        /// Variable name
        var: String,
        /// Rejected value
        value: String,
    },

    /// Level tag is not usable in store keys
    #[error(transparent)]
    InvalidLevelTag(#[from] IdParseError),
}

impl ConfigError {
    /// Create invalid environment value error
    pub fn invalid_env(var: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidEnv {
            var: var.into(),
            value: value.into(),
        }
    }
}
