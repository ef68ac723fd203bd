//! Key namespace shared with the queue consumer
//!
//! | Key                          | Type   | Value                         |
//! |------------------------------|--------|-------------------------------|
//! | `up:q:0`                     | list   | chunk keys (`l2_1d23`)        |
//! | `up:nu:<chunk key>`          | set    | pending plot ids (`8693`)     |
//! | `up:nu:f:<plot id>`          | string | serialized update flag set    |
//!
//! These strings are read by an existing consumer and must not change.

use upq_types::{ChunkId, ChunkKey, LevelTag, PlotId};

/// Work queue key
pub const QUEUE_KEY: &str = "up:q:0";

/// Prefix of a chunk's pending-plots set
pub const PENDING_PREFIX: &str = "up:nu:";

/// Prefix of a plot's flag record
pub const FLAGS_PREFIX: &str = "up:nu:f:";

/// Builds store keys for one chunk level
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySpace {
    level: LevelTag,
}

impl KeySpace {
    /// Key space for `level`
    #[inline]
    #[must_use]
    pub fn new(level: LevelTag) -> Self {
        Self { level }
    }

    /// Level tag used in chunk keys
    #[inline]
    #[must_use]
    pub fn level(&self) -> &LevelTag {
        &self.level
    }

    /// Work queue key
    #[inline]
    #[must_use]
    pub fn queue_key(&self) -> &'static str {
        QUEUE_KEY
    }

    /// Queue entry for `chunk`
    #[inline]
    #[must_use]
    pub fn chunk_entry(&self, chunk: ChunkId) -> String {
        chunk.key(&self.level).to_string()
    }

    /// Pending-plots set key for `chunk`
    #[inline]
    #[must_use]
    pub fn pending_key(&self, chunk: ChunkId) -> String {
        format!("{PENDING_PREFIX}{}", chunk.key(&self.level))
    }

    /// Pending-plots set key for a raw queue entry
    #[inline]
    #[must_use]
    pub fn pending_key_for_entry(&self, entry: &str) -> String {
        format!("{PENDING_PREFIX}{entry}")
    }

    /// Flag record key for `plot`
    #[inline]
    #[must_use]
    pub fn flags_key(&self, plot: PlotId) -> String {
        format!("{FLAGS_PREFIX}{plot}")
    }

    /// Decode a queue entry
    ///
    /// # Errors
    /// Returns the parse error if the entry is not a `<level>_<hex>` key
    pub fn parse_entry(&self, entry: &str) -> Result<ChunkKey, upq_types::IdParseError> {
        entry.parse()
    }
}
