//! UPQ Types
//!
//! Value types shared by every layer of the update queue:
//! - **ChunkId / PlotId**: `u32` identifiers with canonical hex text forms
//! - **ChunkKey**: `<level>_<hex>` queue entry for a chunk
//! - **UpdateFlagSet**: per-plot update flags and their token encoding
//!
//! # Example
//!
//! ```rust
//! use upq_types::{ChunkId, LevelTag, PlotId, UpdateFlag, UpdateFlagSet};
//!
//! let key = ChunkId::new(0x1d23).key(&LevelTag::default());
//! assert_eq!(key.to_string(), "l2_1d23");
//! assert_eq!(PlotId::new(0x8693).to_string(), "8693");
//!
//! let flags = UpdateFlagSet::from(UpdateFlag::NoImageUpdate);
//! assert_eq!(flags.serialize(), "niu");
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod flags;
pub mod ids;

// Re-exports
pub use error::{FlagParseError, IdParseError};
pub use flags::{UpdateFlag, UpdateFlagSet};
pub use ids::{ChunkId, ChunkKey, LevelTag, PlotId, DEFAULT_LEVEL_TAG};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
