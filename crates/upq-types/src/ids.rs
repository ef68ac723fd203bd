//! Chunk and plot identifiers
//!
//! Both ids are plain `u32` values. Their canonical text forms are what the
//! store keys are built from, so the formatting here is part of the wire
//! contract: lowercase hex, no `0x`, no zero padding.

use crate::error::IdParseError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Level tag used when none is configured
pub const DEFAULT_LEVEL_TAG: &str = "l2";

/// Separator between level tag and hex id in a chunk key
pub const CHUNK_KEY_SEPARATOR: char = '_';

/// Spatial chunk identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(pub u32);

impl ChunkId {
    /// Wrap a raw chunk index
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw chunk index
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Parse the bare hex form (no prefix)
    ///
    /// # Errors
    /// Returns [`IdParseError::InvalidHex`] for empty or non-hex input
    pub fn from_hex(text: &str) -> Result<Self, IdParseError> {
        parse_hex(text).map(Self)
    }

    /// Canonical key under the given level tag
    #[inline]
    #[must_use]
    pub fn key(self, level: &LevelTag) -> ChunkKey {
        ChunkKey::new(level.clone(), self)
    }
}

/// Formats as lowercase hex without prefix
impl Display for ChunkId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl From<u32> for ChunkId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Plot identifier, the 1-based record ordinal in the chunk/plot index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlotId(pub u32);

impl PlotId {
    /// Wrap a raw plot ordinal
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw plot ordinal
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Parse the canonical hex form
    ///
    /// # Errors
    /// Returns [`IdParseError::InvalidHex`] for empty or non-hex input
    pub fn from_hex(text: &str) -> Result<Self, IdParseError> {
        parse_hex(text).map(Self)
    }
}

/// Formats as lowercase hex without prefix
impl Display for PlotId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl From<u32> for PlotId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Level prefix of a chunk key (e.g. `l2`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LevelTag(String);

impl LevelTag {
    /// Validate and wrap a level tag
    ///
    /// # Errors
    /// Returns [`IdParseError::InvalidLevelTag`] if the tag is empty or
    /// contains the key separator, `:` or whitespace
    pub fn new(tag: impl Into<String>) -> Result<Self, IdParseError> {
        let tag = tag.into();
        if tag.is_empty()
            || tag.contains(CHUNK_KEY_SEPARATOR)
            || tag.contains(':')
            || tag.chars().any(char::is_whitespace)
        {
            return Err(IdParseError::InvalidLevelTag(tag));
        }
        Ok(Self(tag))
    }

    /// Tag text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LevelTag {
    fn default() -> Self {
        Self(DEFAULT_LEVEL_TAG.to_string())
    }
}

impl Display for LevelTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LevelTag {
    type Error = IdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LevelTag> for String {
    fn from(tag: LevelTag) -> Self {
        tag.0
    }
}

/// Canonical chunk key: `<level>_<hex chunk id>`
///
/// This is the value pushed onto the work queue and the suffix of the
/// chunk's pending-set key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    level: LevelTag,
    id: ChunkId,
}

impl ChunkKey {
    /// Build a key from its parts
    #[inline]
    #[must_use]
    pub fn new(level: LevelTag, id: ChunkId) -> Self {
        Self { level, id }
    }

    /// Level tag
    #[inline]
    #[must_use]
    pub fn level(&self) -> &LevelTag {
        &self.level
    }

    /// Chunk id
    #[inline]
    #[must_use]
    pub fn id(&self) -> ChunkId {
        self.id
    }
}

impl Display for ChunkKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.level, CHUNK_KEY_SEPARATOR, self.id)
    }
}

impl FromStr for ChunkKey {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (level, hex) = s
            .split_once(CHUNK_KEY_SEPARATOR)
            .ok_or_else(|| IdParseError::MissingLevelTag(s.to_string()))?;
        Ok(Self {
            level: LevelTag::new(level)?,
            id: ChunkId::from_hex(hex)?,
        })
    }
}

fn parse_hex(text: &str) -> Result<u32, IdParseError> {
    // from_str_radix tolerates a leading '+', the key format does not
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(IdParseError::invalid_hex(text));
    }
    u32::from_str_radix(text, 16).map_err(|_| IdParseError::invalid_hex(text))
}
