//! Error types for model graph operations.

use crate::id::ObjectId;
use crate::node::ObjectKind;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while manipulating the in-memory graph.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Object not found in the model.
    #[error("{kind:?} not found: {id}")]
    NotFound {
        /// Kind searched.
        kind: ObjectKind,
        /// Identifier that was not found.
        id: ObjectId,
    },

    /// Object with the same identifier already present.
    #[error("duplicate {kind:?}: {id}")]
    Duplicate {
        /// Kind of the duplicate.
        kind: ObjectKind,
        /// Duplicated identifier.
        id: ObjectId,
    },

    /// A deferred endpoint reference stayed unresolved after the final
    /// resolution pass.
    #[error("unresolved reference: {waiting} still waits for {awaited}")]
    UnresolvedReference {
        /// The object holding the dangling reference.
        waiting: ObjectId,
        /// The identifier that never materialized.
        awaited: ObjectId,
    },

    /// The in-memory graph could not be reverted after a failed operation
    /// and no longer mirrors any committed state.
    #[error("model is inconsistent: {message}")]
    Inconsistent {
        /// Description of the failed reversion.
        message: String,
    },

    /// Edit applied or reverted out of order.
    #[error("invalid edit: {message}")]
    InvalidEdit {
        /// Description of the misuse.
        message: String,
    },
}

impl ModelError {
    /// Creates a not-found error.
    pub fn not_found(kind: ObjectKind, id: ObjectId) -> Self {
        Self::NotFound { kind, id }
    }

    /// Creates a duplicate error.
    pub fn duplicate(kind: ObjectKind, id: ObjectId) -> Self {
        Self::Duplicate { kind, id }
    }

    /// Creates an inconsistency error.
    pub fn inconsistent(message: impl Into<String>) -> Self {
        Self::Inconsistent {
            message: message.into(),
        }
    }

    /// Creates an invalid-edit error.
    pub fn invalid_edit(message: impl Into<String>) -> Self {
        Self::InvalidEdit {
            message: message.into(),
        }
    }
}
