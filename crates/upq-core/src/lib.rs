//! UPQ Core
//!
//! Producer side of the plot update queue:
//! - **UpdateDispatcher**: resolves a chunk to its plots and commits one
//!   atomic store update per request
//! - **BatchReport**: per-chunk outcomes of a multi-chunk dispatch
//! - **DelayedUpdates**: per-chunk coalescing with a flush deadline
//! - **UpqConfig**: file and environment configuration
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use upq_core::UpdateDispatcher;
//! use upq_index::ChunkPlotIndex;
//! use upq_store::MemoryStore;
//! use upq_types::ChunkId;
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! // Two records, both owned by chunk 0: plots 1 and 2
//! let bytes = [0u8, 0, 0, 0, 9, 9, 9, 9, 0, 0, 0, 0, 9, 9, 9, 9];
//! let index = ChunkPlotIndex::load(&bytes).unwrap();
//! let store = Arc::new(MemoryStore::new());
//! let dispatcher = UpdateDispatcher::new(Arc::new(index), store.clone());
//!
//! let marked = dispatcher.dispatch_default(ChunkId::new(0)).await.unwrap();
//! assert_eq!(marked, 2);
//! assert_eq!(store.list("up:q:0"), vec!["l2_0"]);
//! # });
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod delayed;
pub mod dispatcher;
pub mod error;
pub mod state_machine;

// Re-exports
pub use config::{UpqConfig, DEFAULT_INDEX_PATH};
pub use delayed::DelayedUpdates;
pub use dispatcher::{BatchReport, DispatchOutcome, UpdateDispatcher};
pub use error::{ConfigError, DispatchError, StateMachineError, UpqError};
pub use state_machine::{allowed_transitions, validate_transition, DispatchRequest, DispatchState};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
