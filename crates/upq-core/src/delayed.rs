//! Coalescing of plot updates per chunk
//!
//! Callers that touch the same chunk many times in a short window can track
//! each plot here and flush once per chunk instead of committing per plot.
//! The first `track` for a chunk fixes its flush deadline; later plots for
//! the same chunk join that flush. A flush only queues the chunk when its
//! pending set is new in the store: a chunk still waiting for a consumer
//! just gains plots.

use crate::error::DispatchError;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::time::{Duration, Instant};
use upq_store::NotificationStore;
use upq_types::{ChunkId, PlotId};

/// Delayed, per-chunk coalesced updates
#[derive(Debug, Default)]
pub struct DelayedUpdates {
    deadlines: BinaryHeap<Reverse<(Instant, ChunkId)>>,
    pending: HashMap<ChunkId, BTreeSet<PlotId>>,
}

impl DelayedUpdates {
    /// Empty tracker
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `plot` in `chunk` needs an update
    ///
    /// Schedules a flush at `now + delay` unless the chunk is already
    /// scheduled.
    pub fn track(&mut self, chunk: ChunkId, plot: PlotId, delay: Duration, now: Instant) {
        let plots = self.pending.entry(chunk).or_insert_with(|| {
            self.deadlines.push(Reverse((now + delay, chunk)));
            BTreeSet::new()
        });
        plots.insert(plot);
    }

    /// Chunks currently tracked
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Nothing tracked
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Plots tracked for `chunk`
    #[must_use]
    pub fn plots(&self, chunk: ChunkId) -> Option<&BTreeSet<PlotId>> {
        self.pending.get(&chunk)
    }

    /// Earliest scheduled flush
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.peek().map(|Reverse((at, _))| *at)
    }

    /// Commit every chunk whose deadline is at or before `now`
    ///
    /// Returns the number of chunks committed. On a store failure the
    /// failing chunk stays scheduled and later chunks are not attempted.
    ///
    /// # Errors
    /// Returns [`DispatchError::Store`] from the first failed commit
    pub async fn refresh(
        &mut self,
        store: &dyn NotificationStore,
        now: Instant,
    ) -> Result<usize, DispatchError> {
        let mut flushed = 0;
        while let Some(&Reverse((at, chunk))) = self.deadlines.peek() {
            if at > now {
                break;
            }
            self.flush(store, chunk).await?;
            self.deadlines.pop();
            flushed += 1;
        }
        if flushed > 0 {
            tracing::debug!(flushed, remaining = self.len(), "delayed updates refreshed");
        }
        Ok(flushed)
    }

    /// Commit everything still tracked, regardless of deadlines
    ///
    /// Chunks are committed in id order and forgotten as they succeed.
    ///
    /// # Errors
    /// Returns [`DispatchError::Store`] from the first failed commit; the
    /// failing chunk and all later ones stay tracked
    pub async fn purge(&mut self, store: &dyn NotificationStore) -> Result<usize, DispatchError> {
        let mut chunks: Vec<ChunkId> = self.pending.keys().copied().collect();
        chunks.sort_unstable();

        let mut flushed = 0;
        let mut result = Ok(());
        for chunk in chunks {
            result = self.flush(store, chunk).await;
            if result.is_err() {
                break;
            }
            flushed += 1;
        }
        self.deadlines
            .retain(|Reverse((_, chunk))| self.pending.contains_key(chunk));
        result?;
        tracing::debug!(flushed, "delayed updates purged");
        Ok(flushed)
    }

    async fn flush(&mut self, store: &dyn NotificationStore, chunk: ChunkId) -> Result<(), DispatchError> {
        let Some(plots) = self.pending.get(&chunk) else {
            return Ok(());
        };
        let plots: Vec<PlotId> = plots.iter().copied().collect();
        let enqueued = store.commit_coalesced(chunk, &plots).await?;
        tracing::trace!(%chunk, enqueued, "delayed chunk flushed");
        self.pending.remove(&chunk);
        Ok(())
    }
}
