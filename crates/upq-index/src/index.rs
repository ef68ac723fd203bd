//! Chunk/plot index decoded from the binary map file
//!
//! The file is a flat run of little-endian `u32` pairs. The first field of
//! each pair is the owning chunk; the second is not used here. Plot ids are
//! not stored: the plot id of a record is its 1-based position in the file,
//! counted across all chunks.

use crate::error::{IndexError, RECORD_SIZE};
use std::collections::HashMap;
use std::path::Path;
use upq_types::{ChunkId, PlotId};

/// Immutable chunk → plots mapping
///
/// Built once from the full byte stream. Lookups never fail: a chunk that
/// owns no plots yields an empty slice.
#[derive(Debug, Clone, Default)]
pub struct ChunkPlotIndex {
    /// Plots per chunk, in file order
    by_chunk: HashMap<ChunkId, Vec<PlotId>>,

    /// Owning chunk per plot, indexed by `plot - 1`
    owners: Vec<ChunkId>,
}

impl ChunkPlotIndex {
    /// Decode an index from raw bytes
    ///
    /// # Errors
    /// Returns [`IndexError::Malformed`] if the length is not a multiple of 8
    pub fn load(bytes: &[u8]) -> Result<Self, IndexError> {
        if bytes.len() % RECORD_SIZE != 0 {
            return Err(IndexError::Malformed { len: bytes.len() });
        }

        let records = bytes.len() / RECORD_SIZE;
        if u32::try_from(records).is_err() {
            return Err(IndexError::TooManyRecords(records));
        }

        let mut by_chunk: HashMap<ChunkId, Vec<PlotId>> = HashMap::new();
        let mut owners = Vec::with_capacity(records);

        for (ordinal, record) in (1u32..).zip(bytes.chunks_exact(RECORD_SIZE)) {
            let chunk = ChunkId::new(u32::from_le_bytes([
                record[0], record[1], record[2], record[3],
            ]));
            by_chunk.entry(chunk).or_default().push(PlotId::new(ordinal));
            owners.push(chunk);
        }

        tracing::debug!(
            records,
            chunks = by_chunk.len(),
            "decoded chunk/plot index"
        );

        Ok(Self { by_chunk, owners })
    }

    /// Read and decode an index file
    ///
    /// # Errors
    /// Returns [`IndexError::Io`] if the file cannot be read, or any error of
    /// [`ChunkPlotIndex::load`]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| IndexError::io_error(path, e))?;
        Self::load(&bytes)
    }

    /// Plots owned by `chunk`, ascending
    #[inline]
    #[must_use]
    pub fn plots_for(&self, chunk: ChunkId) -> &[PlotId] {
        self.by_chunk
            .get(&chunk)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Chunk owning `plot`
    #[must_use]
    pub fn chunk_of(&self, plot: PlotId) -> Option<ChunkId> {
        let slot = usize::try_from(plot.get()).ok()?.checked_sub(1)?;
        self.owners.get(slot).copied()
    }

    /// Every chunk with at least one plot, ascending
    #[must_use]
    pub fn chunk_ids(&self) -> Vec<ChunkId> {
        let mut ids: Vec<_> = self.by_chunk.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of distinct chunks
    #[inline]
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.by_chunk.len()
    }

    /// Number of plots (= records)
    #[inline]
    #[must_use]
    pub fn plot_count(&self) -> usize {
        self.owners.len()
    }

    /// True when the index holds no records
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(records: &[(u32, u32)]) -> Vec<u8> {
        records
            .iter()
            .flat_map(|(chunk, secondary)| {
                chunk
                    .to_le_bytes()
                    .into_iter()
                    .chain(secondary.to_le_bytes())
            })
            .collect()
    }

    #[test]
    fn plots_are_record_ordinals() {
        let index = ChunkPlotIndex::load(&encode(&[(0, 7), (0, 9)])).unwrap();
        assert_eq!(index.plots_for(ChunkId::new(0)), &[PlotId::new(1), PlotId::new(2)]);
        assert_eq!(index.plot_count(), 2);
        assert_eq!(index.chunk_count(), 1);
    }

    #[test]
    fn ordinals_are_global_across_chunks() {
        let index = ChunkPlotIndex::load(&encode(&[(3, 0), (5, 0), (3, 0), (5, 0), (4, 0)])).unwrap();
        assert_eq!(index.plots_for(ChunkId::new(3)), &[PlotId::new(1), PlotId::new(3)]);
        assert_eq!(index.plots_for(ChunkId::new(5)), &[PlotId::new(2), PlotId::new(4)]);
        assert_eq!(index.plots_for(ChunkId::new(4)), &[PlotId::new(5)]);
        assert_eq!(
            index.chunk_ids(),
            vec![ChunkId::new(3), ChunkId::new(4), ChunkId::new(5)]
        );
    }

    #[test]
    fn secondary_field_is_ignored() {
        let a = ChunkPlotIndex::load(&encode(&[(1, 0), (2, 0)])).unwrap();
        let b = ChunkPlotIndex::load(&encode(&[(1, u32::MAX), (2, 42)])).unwrap();
        assert_eq!(a.plots_for(ChunkId::new(1)), b.plots_for(ChunkId::new(1)));
        assert_eq!(a.plots_for(ChunkId::new(2)), b.plots_for(ChunkId::new(2)));
    }

    #[test]
    fn fields_are_little_endian() {
        let index = ChunkPlotIndex::load(&[0x23, 0x1d, 0, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(index.plots_for(ChunkId::new(0x1d23)), &[PlotId::new(1)]);
    }

    #[test]
    fn unknown_chunk_has_no_plots() {
        let index = ChunkPlotIndex::load(&encode(&[(0, 0)])).unwrap();
        assert!(index.plots_for(ChunkId::new(99)).is_empty());
    }

    #[test]
    fn empty_input_is_valid() {
        let index = ChunkPlotIndex::load(&[]).unwrap();
        assert!(index.is_empty());
        assert!(index.chunk_ids().is_empty());
    }

    #[test]
    fn rejects_partial_records() {
        for len in [1, 4, 7, 9, 12, 15] {
            let bytes = vec![0u8; len];
            assert!(matches!(
                ChunkPlotIndex::load(&bytes),
                Err(IndexError::Malformed { len: l }) if l == len
            ));
        }
    }

    #[test]
    fn chunk_of_reverse_lookup() {
        let index = ChunkPlotIndex::load(&encode(&[(8, 0), (6, 0)])).unwrap();
        assert_eq!(index.chunk_of(PlotId::new(1)), Some(ChunkId::new(8)));
        assert_eq!(index.chunk_of(PlotId::new(2)), Some(ChunkId::new(6)));
        assert_eq!(index.chunk_of(PlotId::new(0)), None);
        assert_eq!(index.chunk_of(PlotId::new(3)), None);
    }
}
