//! Chunk-update dispatch
//!
//! The dispatcher owns no mutable state: the index is an immutable snapshot
//! and every cross-producer effect goes through one atomic store commit.

use crate::error::DispatchError;
use crate::state_machine::{DispatchRequest, DispatchState};
use std::sync::Arc;
use upq_index::ChunkPlotIndex;
use upq_store::{ChunkUpdate, NotificationStore};
use upq_types::{ChunkId, PlotId, UpdateFlagSet};

/// Resolves chunks to plots and commits update notifications
#[derive(Debug, Clone)]
pub struct UpdateDispatcher {
    index: Arc<ChunkPlotIndex>,
    store: Arc<dyn NotificationStore>,
}

impl UpdateDispatcher {
    /// Create a dispatcher over an index snapshot and a store
    #[inline]
    #[must_use]
    pub fn new(index: Arc<ChunkPlotIndex>, store: Arc<dyn NotificationStore>) -> Self {
        Self { index, store }
    }

    /// Index snapshot
    #[inline]
    #[must_use]
    pub fn index(&self) -> &ChunkPlotIndex {
        &self.index
    }

    /// Backing store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    /// Build the store update for `chunk` without committing it
    ///
    /// Plots whose computed flag set is empty get no flag record.
    ///
    /// # Errors
    /// Returns [`DispatchError::UnknownChunk`] if the chunk has no plots
    pub fn resolve<F>(&self, chunk: ChunkId, flags_for: F) -> Result<ChunkUpdate, DispatchError>
    where
        F: Fn(PlotId) -> UpdateFlagSet,
    {
        let plots = self.index.plots_for(chunk);
        if plots.is_empty() {
            return Err(DispatchError::UnknownChunk(chunk));
        }

        let update = plots
            .iter()
            .map(|&plot| (plot, flags_for(plot)))
            .filter(|(_, flags)| !flags.is_empty())
            .fold(
                ChunkUpdate::new(chunk).with_plots(plots.iter().copied()),
                |update, (plot, flags)| update.with_flags(plot, flags),
            );
        Ok(update)
    }

    /// Enqueue `chunk` and mark all of its plots pending
    ///
    /// Returns the number of plots marked pending. Nothing is retried here;
    /// a failed dispatch leaves no trace in the store and may be repeated.
    ///
    /// # Errors
    /// - [`DispatchError::UnknownChunk`] if the chunk has no plots (no store
    ///   access happens)
    /// - [`DispatchError::Store`] if the commit failed
    pub async fn dispatch<F>(&self, chunk: ChunkId, flags_for: F) -> Result<usize, DispatchError>
    where
        F: Fn(PlotId) -> UpdateFlagSet,
    {
        let mut request = DispatchRequest::new(chunk);

        let update = match self.resolve(chunk, flags_for) {
            Ok(update) => update,
            Err(e) => {
                advance(&mut request, DispatchState::Failed);
                tracing::warn!(%chunk, error = %e, "dispatch rejected");
                return Err(e);
            }
        };
        advance(&mut request, DispatchState::Resolved);
        tracing::debug!(
            %chunk,
            plots = update.plots.len(),
            flagged = update.flags.len(),
            "chunk resolved"
        );

        if let Err(e) = self.store.commit(&update).await {
            advance(&mut request, DispatchState::Failed);
            tracing::warn!(%chunk, error = %e, "dispatch commit failed");
            return Err(e.into());
        }
        advance(&mut request, DispatchState::Committed);

        let key = chunk.key(self.store.key_space().level());
        tracing::info!(chunk = %key, plots = update.plots.len(), "dispatched chunk update");
        Ok(update.plots.len())
    }

    /// Dispatch with no flags on any plot
    ///
    /// # Errors
    /// Same as [`dispatch`](Self::dispatch)
    pub async fn dispatch_default(&self, chunk: ChunkId) -> Result<usize, DispatchError> {
        self.dispatch(chunk, |_| UpdateFlagSet::new()).await
    }

    /// Dispatch every chunk in order, continuing past failures
    pub async fn dispatch_batch<I, F>(&self, chunks: I, flags_for: F) -> BatchReport
    where
        I: IntoIterator<Item = ChunkId>,
        F: Fn(PlotId) -> UpdateFlagSet,
    {
        let mut report = BatchReport::default();
        for chunk in chunks {
            let result = self.dispatch(chunk, &flags_for).await;
            report.outcomes.push(DispatchOutcome { chunk, result });
        }
        tracing::info!(
            succeeded = report.succeeded().count(),
            failed = report.failed().count(),
            "batch dispatch finished"
        );
        report
    }
}

/// Steps taken by `dispatch` follow the lifecycle, so a rejected move is a
/// bug in this module rather than a request failure.
fn advance(request: &mut DispatchRequest, to: DispatchState) {
    let moved = request.advance(to);
    debug_assert!(moved.is_ok(), "{moved:?}");
}

/// Result of dispatching one chunk within a batch
#[derive(Debug)]
pub struct DispatchOutcome {
    /// Requested chunk
    pub chunk: ChunkId,
    /// Plots marked, or the reason the request failed
    pub result: Result<usize, DispatchError>,
}

/// Per-chunk results of [`UpdateDispatcher::dispatch_batch`], in request order
#[derive(Debug, Default)]
pub struct BatchReport {
    outcomes: Vec<DispatchOutcome>,
}

impl BatchReport {
    /// All outcomes in request order
    #[inline]
    #[must_use]
    pub fn outcomes(&self) -> &[DispatchOutcome] {
        &self.outcomes
    }

    /// Chunks that were committed, with their plot counts
    pub fn succeeded(&self) -> impl Iterator<Item = (ChunkId, usize)> + '_ {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|&n| (o.chunk, n)))
    }

    /// Chunks that failed, with their errors
    pub fn failed(&self) -> impl Iterator<Item = (ChunkId, &DispatchError)> + '_ {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.chunk, e)))
    }

    /// No request failed
    #[inline]
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Total plots marked pending across committed chunks
    #[must_use]
    pub fn plots_marked(&self) -> usize {
        self.succeeded().map(|(_, n)| n).sum()
    }

    /// Number of requests
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Empty batch
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
