//! Error types for the pocketsheet core.
//!
//! The remote-store and sync layers use typed errors so callers can
//! distinguish "the endpoint is unreachable" from "the endpoint answered
//! with something that is not our data". The command layer wraps these
//! with `anyhow` for human-facing context.

/// Errors produced by a [`crate::store::RemoteStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Transport or HTTP failure reaching the remote store, including
    /// client-side timeouts.
    #[error("network error: {0}")]
    Network(String),

    /// The remote responded, but the body was not the expected shape.
    /// Typically a misconfigured or non-public endpoint returning an HTML
    /// login page instead of a JSON array.
    #[error("unexpected response format: {0}")]
    Format(String),

    /// A per-row update/delete targeted an id that is absent from the
    /// remote store. The local and remote views have diverged.
    #[error("transaction '{0}' not found in the remote store")]
    NotFound(String),

    /// The operation is not part of this backend's contract.
    #[error("operation not supported by this backend: {0}")]
    Unsupported(&'static str),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Network(e.to_string())
    }
}

/// Errors surfaced by the synchronization controller.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// No account has been activated yet.
    #[error("no active account")]
    NoActiveAccount,

    /// A mutation referenced an id that is not in the in-memory list.
    #[error("transaction '{0}' not found locally")]
    UnknownTransaction(String),

    /// The remote store failed. Local state is kept as the source of truth.
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Format("expected a JSON array".to_string());
        assert!(err.to_string().contains("unexpected response format"));

        let err = StoreError::NotFound("tx-1".to_string());
        assert!(err.to_string().contains("tx-1"));
    }

    #[test]
    fn test_sync_error_wraps_store_error() {
        let err = SyncError::from(StoreError::Network("timed out".to_string()));
        assert!(matches!(err, SyncError::Store(StoreError::Network(_))));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StoreError>();
        assert_send_sync::<SyncError>();
    }
}
