//! Testing utilities for UPQ workspace
//!
//! Shared fixtures for building index files and in-memory dispatchers.

#![allow(missing_docs)]

use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use upq_core::UpdateDispatcher;
use upq_index::ChunkPlotIndex;
use upq_store::MemoryStore;

/// Encode `(chunk, secondary)` records in index file layout
pub fn index_bytes(records: &[(u32, u32)]) -> Vec<u8> {
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

/// Encode one record per chunk entry, secondary field zeroed
pub fn index_bytes_for_chunks(chunks: &[u32]) -> Vec<u8> {
    let records: Vec<(u32, u32)> = chunks.iter().map(|&c| (c, 0)).collect();
    index_bytes(&records)
}

pub fn index_from_chunks(chunks: &[u32]) -> ChunkPlotIndex {
    ChunkPlotIndex::load(&index_bytes_for_chunks(chunks)).unwrap()
}

/// Write records to a temporary index file
pub fn index_file(records: &[(u32, u32)]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&index_bytes(records)).unwrap();
    file.flush().unwrap();
    file
}

/// Dispatcher over an in-memory store, plus a handle to inspect the store
pub fn memory_dispatcher(chunks: &[u32]) -> (UpdateDispatcher, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = UpdateDispatcher::new(Arc::new(index_from_chunks(chunks)), store.clone());
    (dispatcher, store)
}
