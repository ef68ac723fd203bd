//! In-process store
//!
//! Keeps the same key layout and data types as the Redis backend (lists,
//! sets, strings keyed by the real key strings), so tests can assert on the
//! exact keys a consumer would read. Every operation runs under one lock,
//! which makes `commit`, `claim_next` and `take_plot_flags` atomic.

use crate::error::{StoreError, StoreResult};
use crate::keys::KeySpace;
use crate::store::{
    decode_entry, decode_flags_lossy, decode_flags_strict, decode_plots, ChunkUpdate,
    ClaimedChunk, NotificationStore,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use upq_types::{ChunkId, ChunkKey, PlotId, UpdateFlagSet};

#[derive(Debug, Default)]
struct Tables {
    lists: HashMap<String, VecDeque<String>>,
    sets: HashMap<String, BTreeSet<String>>,
    strings: HashMap<String, String>,
}

impl Tables {
    fn lpush(&mut self, key: &str, value: String) {
        self.lists.entry(key.to_string()).or_default().push_front(value);
    }

    fn rpop(&mut self, key: &str) -> Option<String> {
        let list = self.lists.get_mut(key)?;
        let value = list.pop_back();
        if list.is_empty() {
            self.lists.remove(key);
        }
        value
    }

    fn sadd<I: IntoIterator<Item = String>>(&mut self, key: &str, members: I) {
        let mut members = members.into_iter().peekable();
        if members.peek().is_some() {
            self.sets.entry(key.to_string()).or_default().extend(members);
        }
    }

    fn apply_coalesced(&mut self, keys: &KeySpace, chunk: ChunkId, plots: &[PlotId]) -> bool {
        let pending_key = keys.pending_key(chunk);
        let existed = self.sets.contains_key(&pending_key);
        let before = self.sets.get(&pending_key).map_or(0, BTreeSet::len);
        self.sadd(&pending_key, plots.iter().map(ToString::to_string));
        let added = self.sets.get(&pending_key).map_or(0, BTreeSet::len) > before;

        let enqueue = !existed && added;
        if enqueue {
            self.lpush(keys.queue_key(), keys.chunk_entry(chunk));
        }
        enqueue
    }

    fn apply(&mut self, keys: &KeySpace, update: &ChunkUpdate) {
        self.sadd(
            &keys.pending_key(update.chunk),
            update.plots.iter().map(ToString::to_string),
        );
        for (plot, flags) in &update.flags {
            self.strings.insert(keys.flags_key(*plot), flags.serialize());
        }
        self.lpush(keys.queue_key(), keys.chunk_entry(update.chunk));
    }
}

/// Store backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    keys: KeySpace,
    state: Mutex<Tables>,
    offline: AtomicBool,
}

impl MemoryStore {
    /// Empty store with the default key space
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store with a custom key space
    #[inline]
    #[must_use]
    pub fn with_key_space(keys: KeySpace) -> Self {
        Self {
            keys,
            ..Self::default()
        }
    }

    /// Simulate losing the backend: every operation fails while offline
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Raw list contents, head first
    #[must_use]
    pub fn list(&self, key: &str) -> Vec<String> {
        self.state
            .lock()
            .lists
            .get(key)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Raw set members, sorted
    #[must_use]
    pub fn set_members(&self, key: &str) -> Vec<String> {
        self.state
            .lock()
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Raw string value
    #[must_use]
    pub fn string(&self, key: &str) -> Option<String> {
        self.state.lock().strings.get(key).cloned()
    }

    /// Number of keys currently holding a value
    #[must_use]
    pub fn key_count(&self) -> usize {
        let state = self.state.lock();
        state.lists.len() + state.sets.len() + state.strings.len()
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::unavailable("memory store is offline"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    fn key_space(&self) -> &KeySpace {
        &self.keys
    }

    async fn enqueue_chunk(&self, chunk: ChunkId) -> StoreResult<()> {
        self.check_online()?;
        self.state
            .lock()
            .lpush(self.keys.queue_key(), self.keys.chunk_entry(chunk));
        Ok(())
    }

    async fn mark_plots_pending(&self, chunk: ChunkId, plots: &[PlotId]) -> StoreResult<()> {
        self.check_online()?;
        self.state.lock().sadd(
            &self.keys.pending_key(chunk),
            plots.iter().map(ToString::to_string),
        );
        Ok(())
    }

    async fn set_plot_flags(&self, plot: PlotId, flags: UpdateFlagSet) -> StoreResult<()> {
        self.check_online()?;
        self.state
            .lock()
            .strings
            .insert(self.keys.flags_key(plot), flags.serialize());
        Ok(())
    }

    async fn commit(&self, update: &ChunkUpdate) -> StoreResult<()> {
        self.check_online()?;
        self.state.lock().apply(&self.keys, update);
        tracing::debug!(
            chunk = %update.chunk,
            plots = update.plots.len(),
            flags = update.flags.len(),
            "committed chunk update"
        );
        Ok(())
    }

    async fn commit_coalesced(&self, chunk: ChunkId, plots: &[PlotId]) -> StoreResult<bool> {
        self.check_online()?;
        Ok(self.state.lock().apply_coalesced(&self.keys, chunk, plots))
    }

    async fn queue_len(&self) -> StoreResult<usize> {
        self.check_online()?;
        Ok(self
            .state
            .lock()
            .lists
            .get(self.keys.queue_key())
            .map_or(0, VecDeque::len))
    }

    async fn queued_chunks(&self) -> StoreResult<Vec<ChunkKey>> {
        self.check_online()?;
        self.list(self.keys.queue_key())
            .iter()
            .rev()
            .map(|entry| decode_entry(&self.keys, entry))
            .collect()
    }

    async fn pending_plots(&self, chunk: ChunkId) -> StoreResult<BTreeSet<PlotId>> {
        self.check_online()?;
        let key = self.keys.pending_key(chunk);
        decode_plots(&key, self.set_members(&key))
    }

    async fn plot_flags(&self, plot: PlotId) -> StoreResult<Option<UpdateFlagSet>> {
        self.check_online()?;
        let key = self.keys.flags_key(plot);
        self.string(&key)
            .map(|raw| decode_flags_strict(&key, &raw))
            .transpose()
    }

    async fn claim_next(&self) -> StoreResult<Option<ClaimedChunk>> {
        self.check_online()?;
        let (entry, members) = {
            let mut state = self.state.lock();
            let Some(entry) = state.rpop(self.keys.queue_key()) else {
                return Ok(None);
            };
            let members = state
                .sets
                .remove(&self.keys.pending_key_for_entry(&entry))
                .unwrap_or_default();
            (entry, members)
        };

        let key = decode_entry(&self.keys, &entry)?;
        let plots = decode_plots(&self.keys.pending_key_for_entry(&entry), members)?;
        Ok(Some(ClaimedChunk { key, plots }))
    }

    async fn take_plot_flags(&self, plots: &[PlotId]) -> StoreResult<Vec<(PlotId, UpdateFlagSet)>> {
        self.check_online()?;
        let mut state = self.state.lock();
        Ok(plots
            .iter()
            .filter_map(|plot| {
                let key = self.keys.flags_key(*plot);
                state
                    .strings
                    .remove(&key)
                    .map(|raw| (*plot, decode_flags_lossy(&key, &raw)))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upq_types::UpdateFlag;

    #[tokio::test]
    async fn commit_writes_all_three_structures() {
        let store = MemoryStore::new();
        let flags = UpdateFlagSet::from(UpdateFlag::NoImageUpdate);
        let update = ChunkUpdate::new(ChunkId::new(0x1d23))
            .with_plots([PlotId::new(0x8693)])
            .with_flags(PlotId::new(0x8693), flags);

        store.commit(&update).await.unwrap();

        assert_eq!(store.list("up:q:0"), vec!["l2_1d23"]);
        assert_eq!(store.set_members("up:nu:l2_1d23"), vec!["8693"]);
        assert_eq!(store.string("up:nu:f:8693").as_deref(), Some("niu"));
    }

    #[tokio::test]
    async fn offline_store_rejects_and_keeps_state() {
        let store = MemoryStore::new();
        store.set_offline(true);

        let update = ChunkUpdate::new(ChunkId::new(1)).with_plots([PlotId::new(1)]);
        let err = store.commit(&update).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.key_count(), 0);

        store.set_offline(false);
        store.commit(&update).await.unwrap();
        assert_eq!(store.queue_len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn queue_is_fifo() {
        let store = MemoryStore::new();
        for raw in [3, 1, 2] {
            store.enqueue_chunk(ChunkId::new(raw)).await.unwrap();
        }

        let order: Vec<_> = store
            .queued_chunks()
            .await
            .unwrap()
            .into_iter()
            .map(|k| k.id().get())
            .collect();
        assert_eq!(order, vec![3, 1, 2]);

        let first = store.claim_next().await.unwrap().unwrap();
        assert_eq!(first.key.id(), ChunkId::new(3));
    }

    #[tokio::test]
    async fn claim_drains_pending_set() {
        let store = MemoryStore::new();
        let update = ChunkUpdate::new(ChunkId::new(5)).with_plots([PlotId::new(1), PlotId::new(2)]);
        store.commit(&update).await.unwrap();
        store.commit(&update).await.unwrap();

        let first = store.claim_next().await.unwrap().unwrap();
        assert_eq!(first.plots.len(), 2);
        assert!(store.pending_plots(ChunkId::new(5)).await.unwrap().is_empty());

        // Duplicate entry is still queued, but there is nothing left to do.
        let second = store.claim_next().await.unwrap().unwrap();
        assert_eq!(second.key.id(), ChunkId::new(5));
        assert!(second.plots.is_empty());

        assert!(store.claim_next().await.unwrap().is_none());
        assert_eq!(store.key_count(), 0);
    }

    #[tokio::test]
    async fn take_plot_flags_deletes_records() {
        let store = MemoryStore::new();
        store
            .set_plot_flags(PlotId::new(1), UpdateFlag::DefaultJson.into())
            .await
            .unwrap();

        let taken = store
            .take_plot_flags(&[PlotId::new(1), PlotId::new(2)])
            .await
            .unwrap();
        assert_eq!(
            taken,
            vec![(PlotId::new(1), UpdateFlagSet::from(UpdateFlag::DefaultJson))]
        );
        assert_eq!(store.plot_flags(PlotId::new(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn coalesced_commit_enqueues_once_per_pending_set() {
        let store = MemoryStore::new();
        let chunk = ChunkId::new(1);

        assert!(store.commit_coalesced(chunk, &[PlotId::new(1)]).await.unwrap());
        assert!(!store.commit_coalesced(chunk, &[PlotId::new(2)]).await.unwrap());
        assert!(!store.commit_coalesced(chunk, &[PlotId::new(2)]).await.unwrap());
        assert_eq!(store.list("up:q:0"), vec!["l2_1"]);
        assert_eq!(store.set_members("up:nu:l2_1"), vec!["1", "2"]);

        // once the consumer drains the chunk it can be queued again
        store.claim_next().await.unwrap();
        assert!(store.commit_coalesced(chunk, &[PlotId::new(2)]).await.unwrap());
        assert_eq!(store.list("up:q:0"), vec!["l2_1"]);
    }

    #[tokio::test]
    async fn coalesced_commit_with_no_plots_is_noop() {
        let store = MemoryStore::new();
        assert!(!store.commit_coalesced(ChunkId::new(1), &[]).await.unwrap());
        assert_eq!(store.key_count(), 0);
    }

    #[tokio::test]
    async fn mark_empty_plot_list_creates_nothing() {
        let store = MemoryStore::new();
        store.mark_plots_pending(ChunkId::new(1), &[]).await.unwrap();
        assert_eq!(store.key_count(), 0);
    }
}
