//! UPQ Store
//!
//! The shared key-value store producers write update notifications into.
//!
//! # Overview
//!
//! - **NotificationStore**: async trait over the three logical structures
//!   (work queue, pending-plots sets, flag records)
//! - **KeySpace**: the key layout consumers depend on (`up:q:0`, `up:nu:`, `up:nu:f:`)
//! - **MemoryStore**: in-process backend for tests and dry runs
//! - **RedisStore**: Redis backend with Lua-scripted atomic commits
//!
//! # Example
//!
//! ```rust
//! use upq_store::{ChunkUpdate, MemoryStore, NotificationStore};
//! use upq_types::{ChunkId, PlotId};
//!
//! # async fn example() -> Result<(), upq_store::StoreError> {
//! let store = MemoryStore::new();
//! let update = ChunkUpdate::new(ChunkId::new(0x1d23)).with_plots([PlotId::new(0x8693)]);
//! store.commit(&update).await?;
//! assert_eq!(store.list("up:q:0"), vec!["l2_1d23"]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod keys;
pub mod memory;
pub mod redis_store;
pub mod store;

// Re-exports
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use keys::{KeySpace, FLAGS_PREFIX, PENDING_PREFIX, QUEUE_KEY};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use store::{ChunkUpdate, ClaimedChunk, NotificationStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
