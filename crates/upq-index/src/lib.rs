//! UPQ Index
//!
//! Decodes the chunk/plot binary map into a read-only lookup.
//!
//! # Format
//!
//! A flat sequence of little-endian `u32` pairs `(chunk_id, secondary)`.
//! The plot id of a pair is its 1-based position in the file; the
//! `secondary` field is reserved and ignored.
//!
//! # Example
//!
//! ```rust
//! use upq_index::ChunkPlotIndex;
//! use upq_types::{ChunkId, PlotId};
//!
//! let bytes = [0u8; 16]; // two records, both owned by chunk 0
//! let index = ChunkPlotIndex::load(&bytes).unwrap();
//! assert_eq!(index.plots_for(ChunkId::new(0)), &[PlotId::new(1), PlotId::new(2)]);
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod index;

// Re-exports
pub use error::{IndexError, RECORD_SIZE};
pub use index::ChunkPlotIndex;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
