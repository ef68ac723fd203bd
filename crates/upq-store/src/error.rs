//! Error types for store operations

/// Errors raised by a [`NotificationStore`](crate::NotificationStore)
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend unreachable, or the command/transaction failed
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// What failed
        reason: String,
        /// Backend error, if any
        #[source]
        source: Option<redis::RedisError>,
    },

    /// A stored value could not be decoded
    #[error("corrupt record at '{key}': {reason}")]
    CorruptRecord {
        /// Key holding the value
        key: String,
        /// Why decoding failed
        reason: String,
    },
}

impl StoreError {
    /// Create unavailable error without a backend cause
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
            source: None,
        }
    }

    /// Create corrupt record error
    pub fn corrupt(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::CorruptRecord {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether retrying the same request may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        Self::Unavailable {
            reason: err.to_string(),
            source: Some(err),
        }
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_display_and_retry() {
        let err = StoreError::unavailable("connection refused");
        assert_eq!(err.to_string(), "store unavailable: connection refused");
        assert!(err.is_retryable());
    }

    #[test]
    fn corrupt_is_not_retryable() {
        let err = StoreError::corrupt("up:nu:f:1", "unknown token");
        assert!(err.to_string().contains("up:nu:f:1"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn from_redis_error() {
        let redis_err = redis::RedisError::from((redis::ErrorKind::IoError, "refused"));
        let err = StoreError::from(redis_err);
        assert!(matches!(err, StoreError::Unavailable { source: Some(_), .. }));
    }
}
