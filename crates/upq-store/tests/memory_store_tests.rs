use pretty_assertions::assert_eq;
use std::sync::Arc;
use upq_store::{ChunkUpdate, MemoryStore, NotificationStore};
use upq_types::{ChunkId, PlotId, UpdateFlag, UpdateFlagSet};

#[tokio::test]
async fn flags_roundtrip_regardless_of_insertion_order() {
    let store = MemoryStore::new();
    let forward = UpdateFlagSet::new()
        .with(UpdateFlag::DefaultBuild)
        .with(UpdateFlag::NoImageUpdate);
    let backward = UpdateFlagSet::new()
        .with(UpdateFlag::NoImageUpdate)
        .with(UpdateFlag::DefaultBuild);

    store.set_plot_flags(PlotId::new(7), backward).await.unwrap();
    assert_eq!(store.plot_flags(PlotId::new(7)).await.unwrap(), Some(forward));
    assert_eq!(store.string("up:nu:f:7").as_deref(), Some("sdb niu"));
}

#[tokio::test]
async fn set_plot_flags_overwrites() {
    let store = MemoryStore::new();
    store
        .set_plot_flags(PlotId::new(1), UpdateFlag::DefaultJson.into())
        .await
        .unwrap();
    store
        .set_plot_flags(PlotId::new(1), UpdateFlag::MetadataOnly.into())
        .await
        .unwrap();

    let flags = store.plot_flags(PlotId::new(1)).await.unwrap().unwrap();
    assert!(flags.has(UpdateFlag::MetadataOnly));
    assert!(!flags.has(UpdateFlag::DefaultJson));
}

#[tokio::test]
async fn commit_without_flags_writes_no_flag_records() {
    let store = MemoryStore::new();
    let update = ChunkUpdate::new(ChunkId::new(1)).with_plots([PlotId::new(1)]);
    store.commit(&update).await.unwrap();

    assert!(store.plot_flags(PlotId::new(1)).await.unwrap().is_none());
    assert!(store.string("up:nu:f:1").is_none());
}

#[tokio::test]
async fn concurrent_producers_never_lose_entries() {
    let store = Arc::new(MemoryStore::new());
    let mut handles = Vec::new();

    for producer in 0..8u32 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            for round in 0..25u32 {
                let update = ChunkUpdate::new(ChunkId::new(producer % 4))
                    .with_plots([PlotId::new(producer + 1), PlotId::new(round % 3 + 100)]);
                store.commit(&update).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.queue_len().await.unwrap(), 8 * 25);
    for chunk in 0..4u32 {
        let pending = store.pending_plots(ChunkId::new(chunk)).await.unwrap();
        // two producers per chunk, plus the three shared round plots
        assert_eq!(pending.len(), 5);
    }
}

#[tokio::test]
async fn claim_then_take_flags_consumes_everything() {
    let store = MemoryStore::new();
    let update = ChunkUpdate::new(ChunkId::new(0x1d23))
        .with_plots([PlotId::new(0x8693), PlotId::new(0x8694)])
        .with_flags(PlotId::new(0x8693), UpdateFlag::DefaultBuild.into());
    store.commit(&update).await.unwrap();

    let claimed = store.claim_next().await.unwrap().unwrap();
    assert_eq!(claimed.key.to_string(), "l2_1d23");

    let plots: Vec<PlotId> = claimed.plots.into_iter().collect();
    let flags = store.take_plot_flags(&plots).await.unwrap();
    assert_eq!(
        flags,
        vec![(PlotId::new(0x8693), UpdateFlagSet::from(UpdateFlag::DefaultBuild))]
    );
    assert_eq!(store.key_count(), 0);
}
