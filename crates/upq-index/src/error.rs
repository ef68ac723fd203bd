//! Error types for index loading

use std::path::PathBuf;

/// Size in bytes of one `(chunk_id, secondary)` record
pub const RECORD_SIZE: usize = 8;

/// Errors while loading a [`ChunkPlotIndex`](crate::ChunkPlotIndex)
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Byte length is not a whole number of records
    #[error("malformed index: {len} bytes is not a multiple of {RECORD_SIZE}")]
    Malformed {
        /// Byte length of the input
        len: usize,
    },

    /// More records than plot ids can address
    #[error("index has {0} records, more than a u32 plot id can address")]
    TooManyRecords(usize),

    /// IO error while reading the index file
    #[error("io error reading {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl IndexError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
