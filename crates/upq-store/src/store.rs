//! The notification store contract
//!
//! Producers write three structures: the work queue, a pending-plots set per
//! chunk, and a flag record per plot. [`NotificationStore::commit`] writes all
//! of them for one chunk as a single unit; the finer-grained methods exist for
//! tooling and for consumers.

use crate::error::{StoreError, StoreResult};
use crate::keys::KeySpace;
use async_trait::async_trait;
use std::collections::BTreeSet;
use upq_types::{ChunkId, ChunkKey, PlotId, UpdateFlagSet};

/// Everything one chunk-update request writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkUpdate {
    /// Chunk to enqueue
    pub chunk: ChunkId,
    /// Plots to mark pending
    pub plots: Vec<PlotId>,
    /// Flag records to overwrite
    pub flags: Vec<(PlotId, UpdateFlagSet)>,
}

impl ChunkUpdate {
    /// Update for `chunk` with no plots yet
    #[inline]
    #[must_use]
    pub fn new(chunk: ChunkId) -> Self {
        Self {
            chunk,
            plots: Vec::new(),
            flags: Vec::new(),
        }
    }

    /// With pending plots
    #[inline]
    #[must_use]
    pub fn with_plots(mut self, plots: impl IntoIterator<Item = PlotId>) -> Self {
        self.plots.extend(plots);
        self
    }

    /// With a flag record for `plot`
    #[inline]
    #[must_use]
    pub fn with_flags(mut self, plot: PlotId, flags: UpdateFlagSet) -> Self {
        self.flags.push((plot, flags));
        self
    }
}

/// A chunk taken off the queue together with its pending plots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedChunk {
    /// Queue entry, decoded
    pub key: ChunkKey,
    /// Plots that were pending for the chunk (empty if already drained)
    pub plots: BTreeSet<PlotId>,
}

/// Shared backing store for update notifications
///
/// Implementations must be safe to use from many producers at once; all
/// cross-producer coordination happens inside the backend.
#[async_trait]
pub trait NotificationStore: Send + Sync + std::fmt::Debug {
    /// Key namespace this store writes into
    fn key_space(&self) -> &KeySpace;

    /// Push the chunk's key onto the work queue
    async fn enqueue_chunk(&self, chunk: ChunkId) -> StoreResult<()>;

    /// Add plots to the chunk's pending set (idempotent)
    async fn mark_plots_pending(&self, chunk: ChunkId, plots: &[PlotId]) -> StoreResult<()>;

    /// Overwrite the flag record of `plot`
    async fn set_plot_flags(&self, plot: PlotId, flags: UpdateFlagSet) -> StoreResult<()>;

    /// Apply a whole [`ChunkUpdate`] atomically
    ///
    /// Either the queue entry, every pending plot and every flag record
    /// become visible, or none of them do.
    async fn commit(&self, update: &ChunkUpdate) -> StoreResult<()>;

    /// Add plots to the chunk's pending set, enqueueing the chunk only if
    /// the set is newly created by this call
    ///
    /// Returns whether a queue entry was pushed. A chunk whose pending set
    /// still exists is already queued and waiting for a consumer, so it is
    /// not queued again. An empty `plots` is a no-op.
    async fn commit_coalesced(&self, chunk: ChunkId, plots: &[PlotId]) -> StoreResult<bool>;

    /// Number of queued entries (duplicates counted)
    async fn queue_len(&self) -> StoreResult<usize>;

    /// Queued chunk keys, oldest first
    async fn queued_chunks(&self) -> StoreResult<Vec<ChunkKey>>;

    /// Pending plots of `chunk`
    async fn pending_plots(&self, chunk: ChunkId) -> StoreResult<BTreeSet<PlotId>>;

    /// Flag record of `plot`, if one is stored
    async fn plot_flags(&self, plot: PlotId) -> StoreResult<Option<UpdateFlagSet>>;

    /// Pop the oldest queue entry and drain its pending set in one unit
    async fn claim_next(&self) -> StoreResult<Option<ClaimedChunk>>;

    /// Read and delete the flag records of `plots` in one unit
    ///
    /// Plots without a record are omitted. Unknown tokens are dropped.
    async fn take_plot_flags(&self, plots: &[PlotId]) -> StoreResult<Vec<(PlotId, UpdateFlagSet)>>;
}

pub(crate) fn decode_entry(keys: &KeySpace, entry: &str) -> StoreResult<ChunkKey> {
    keys.parse_entry(entry)
        .map_err(|e| StoreError::corrupt(keys.queue_key(), e))
}

pub(crate) fn decode_plots<I, S>(set_key: &str, members: I) -> StoreResult<BTreeSet<PlotId>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    members
        .into_iter()
        .map(|m| PlotId::from_hex(m.as_ref()).map_err(|e| StoreError::corrupt(set_key, e)))
        .collect()
}

pub(crate) fn decode_flags_strict(key: &str, raw: &str) -> StoreResult<UpdateFlagSet> {
    UpdateFlagSet::parse(raw).map_err(|e| StoreError::corrupt(key, e))
}

pub(crate) fn decode_flags_lossy(key: &str, raw: &str) -> UpdateFlagSet {
    let (flags, unknown) = UpdateFlagSet::parse_lossy(raw);
    if !unknown.is_empty() {
        tracing::warn!(key, ?unknown, "ignoring unknown update flag tokens");
    }
    flags
}
