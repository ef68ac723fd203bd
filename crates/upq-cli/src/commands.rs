//! Subcommand implementations

use anyhow::Context;
use serde_json::json;
use std::sync::Arc;
use upq_core::{UpdateDispatcher, UpqConfig};
use upq_index::ChunkPlotIndex;
use upq_store::{NotificationStore, RedisStore};
use upq_types::{ChunkId, UpdateFlagSet};

/// Which chunks `dispatch` should enqueue
#[derive(Debug, Clone)]
pub(crate) enum ChunkSelection {
    Listed(Vec<ChunkId>),
    AllIndexed,
}

async fn open_index(config: &UpqConfig) -> anyhow::Result<ChunkPlotIndex> {
    let index = ChunkPlotIndex::open(&config.index_path)
        .await
        .with_context(|| format!("loading index {}", config.index_path.display()))?;
    tracing::info!(
        path = %config.index_path.display(),
        chunks = index.chunk_count(),
        plots = index.plot_count(),
        "index loaded"
    );
    Ok(index)
}

async fn connect(config: &UpqConfig) -> anyhow::Result<RedisStore> {
    RedisStore::connect(&config.store, config.key_space())
        .await
        .with_context(|| format!("connecting to {}:{}", config.store.host, config.store.port))
}

/// Returns whether every chunk was dispatched
pub(crate) async fn dispatch(
    config: &UpqConfig,
    selection: ChunkSelection,
    flags: UpdateFlagSet,
) -> anyhow::Result<bool> {
    let index = open_index(config).await?;
    let chunks = match selection {
        ChunkSelection::Listed(chunks) => chunks,
        ChunkSelection::AllIndexed => index.chunk_ids(),
    };
    let store = connect(config).await?;
    let dispatcher = UpdateDispatcher::new(Arc::new(index), Arc::new(store));

    let keys = config.key_space();
    let report = dispatcher.dispatch_batch(chunks, |_| flags).await;
    for outcome in report.outcomes() {
        let key = keys.chunk_entry(outcome.chunk);
        match &outcome.result {
            Ok(plots) => println!("ok      {key} ({plots} plots)"),
            Err(e) => println!("failed  {key}: {e}"),
        }
    }
    println!(
        "{} dispatched, {} failed, {} plots marked",
        report.succeeded().count(),
        report.failed().count(),
        report.plots_marked()
    );
    Ok(report.all_succeeded())
}

pub(crate) async fn inspect(
    config: &UpqConfig,
    chunk: Option<ChunkId>,
    as_json: bool,
) -> anyhow::Result<()> {
    let store = connect(config).await?;
    let queued = store.queued_chunks().await?;

    let detail = match chunk {
        Some(chunk) => {
            let pending = store.pending_plots(chunk).await?;
            let mut flags = Vec::with_capacity(pending.len());
            for &plot in &pending {
                if let Some(set) = store.plot_flags(plot).await? {
                    flags.push((plot, set));
                }
            }
            Some((chunk, pending, flags))
        }
        None => None,
    };

    if as_json {
        let mut report = json!({
            "queue_len": queued.len(),
            "queued": queued.iter().map(ToString::to_string).collect::<Vec<_>>(),
        });
        if let Some((chunk, pending, flags)) = &detail {
            report["chunk"] = json!({
                "key": store.key_space().chunk_entry(*chunk),
                "pending": pending.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "flags": flags
                    .iter()
                    .map(|(plot, set)| (plot.to_string(), json!(set.serialize())))
                    .collect::<serde_json::Map<_, _>>(),
            });
        }
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Queue {}: {} entries", store.key_space().queue_key(), queued.len());
    for key in &queued {
        println!("  {key}");
    }
    if let Some((chunk, pending, flags)) = detail {
        println!();
        println!("Chunk {}", store.key_space().chunk_entry(chunk));
        println!("  Pending plots: {}", pending.len());
        for plot in &pending {
            match flags.iter().find(|(p, _)| p == plot) {
                Some((_, set)) => println!("    {plot} [{set}]"),
                None => println!("    {plot}"),
            }
        }
    }
    Ok(())
}

pub(crate) async fn plots(config: &UpqConfig, chunk: ChunkId) -> anyhow::Result<()> {
    let index = open_index(config).await?;
    let plots = index.plots_for(chunk);
    anyhow::ensure!(
        !plots.is_empty(),
        "chunk {} has no plots in {}",
        config.key_space().chunk_entry(chunk),
        config.index_path.display()
    );
    for plot in plots {
        println!("{plot}");
    }
    Ok(())
}
