use proptest::prelude::*;
use std::io::Write;
use upq_index::{ChunkPlotIndex, IndexError};
use upq_types::{ChunkId, PlotId};

fn encode(chunks: &[u32]) -> Vec<u8> {
    chunks
        .iter()
        .flat_map(|chunk| chunk.to_le_bytes().into_iter().chain(0u32.to_le_bytes()))
        .collect()
}

#[tokio::test]
async fn open_reads_index_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&encode(&[0x1d23, 0x1d23, 7])).unwrap();

    let index = ChunkPlotIndex::open(file.path()).await.unwrap();
    assert_eq!(index.plot_count(), 3);
    assert_eq!(
        index.plots_for(ChunkId::new(0x1d23)),
        &[PlotId::new(1), PlotId::new(2)]
    );
}

#[tokio::test]
async fn open_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = ChunkPlotIndex::open(dir.path().join("cmap_l2.dat")).await;
    assert!(matches!(result, Err(IndexError::Io { .. })));
}

#[tokio::test]
async fn open_truncated_file_is_malformed() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let mut bytes = encode(&[1, 2]);
    bytes.pop();
    file.write_all(&bytes).unwrap();

    let result = ChunkPlotIndex::open(file.path()).await;
    assert!(matches!(result, Err(IndexError::Malformed { len: 15 })));
}

proptest! {
    #[test]
    fn prop_plots_partition_record_ordinals(chunks in proptest::collection::vec(0u32..16, 0..200)) {
        let index = ChunkPlotIndex::load(&encode(&chunks)).unwrap();

        let mut seen: Vec<u32> = index
            .chunk_ids()
            .into_iter()
            .flat_map(|chunk| index.plots_for(chunk).iter().map(|p| p.get()))
            .collect();
        seen.sort_unstable();

        let expected: Vec<u32> = (1..=chunks.len() as u32).collect();
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn prop_reverse_lookup_matches_records(chunks in proptest::collection::vec(any::<u32>(), 1..100)) {
        let index = ChunkPlotIndex::load(&encode(&chunks)).unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            let plot = PlotId::new(i as u32 + 1);
            prop_assert_eq!(index.chunk_of(plot), Some((*chunk).into()));
            prop_assert!(index.plots_for((*chunk).into()).contains(&plot));
        }
    }

    #[test]
    fn prop_plots_ascend_within_chunk(chunks in proptest::collection::vec(0u32..4, 0..100)) {
        let index = ChunkPlotIndex::load(&encode(&chunks)).unwrap();
        for chunk in index.chunk_ids() {
            let plots = index.plots_for(chunk);
            prop_assert!(plots.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
