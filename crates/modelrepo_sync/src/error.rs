//! Error types for the synchronization engine.

use modelrepo_model::{ModelError, ObjectId};
use modelrepo_store::StoreError;
use thiserror::Error;

/// Errors raised by comparison, import and export.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The in-memory graph rejected a mutation.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A deferred endpoint reference never materialized.
    #[error("object {waiting} references {awaited}, which does not exist")]
    UnresolvedReference {
        /// The object holding the dangling reference.
        waiting: ObjectId,
        /// The identifier that never materialized.
        awaited: ObjectId,
    },

    /// The user cancelled the operation.
    #[error("cancelled during {phase}")]
    Cancelled {
        /// The phase that was interrupted.
        phase: &'static str,
    },

    /// The model no longer mirrors any committed state and must be
    /// reloaded before it can synchronize again.
    #[error("model is flagged inconsistent; reload it before synchronizing")]
    ModelInconsistent,

    /// The store committed but reconciling the in-memory graph failed.
    ///
    /// The written data is safe; only the local view may be stale. The
    /// commit is never re-attempted.
    #[error("commit succeeded but local reconciliation failed: {message}")]
    PostCommit {
        /// What went wrong after the commit.
        message: String,
    },

    /// Stored data contradicts itself.
    #[error("integrity violation: {message}")]
    Integrity {
        /// Description of the contradiction.
        message: String,
    },
}

impl SyncError {
    /// Creates a post-commit error.
    pub fn post_commit(message: impl Into<String>) -> Self {
        SyncError::PostCommit {
            message: message.into(),
        }
    }

    /// Creates an integrity error.
    pub fn integrity(message: impl Into<String>) -> Self {
        SyncError::Integrity {
            message: message.into(),
        }
    }
}

/// Convenience result alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
