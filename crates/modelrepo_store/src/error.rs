//! Error types for store operations.

use modelrepo_model::ObjectId;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur at the store boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store is unreachable. Fatal to the current operation, no partial
    /// state change; surfaced verbatim.
    #[error("store unreachable: {0}")]
    Connectivity(String),

    /// Transaction API misuse (commit without begin, nested begin).
    #[error("transaction error: {message}")]
    Transaction {
        /// Description of the misuse.
        message: String,
    },

    /// A row with this `(id, version)` already exists. Version rows are
    /// immutable; this is an integrity error, never an update.
    #[error("duplicate version row: {id} v{version}")]
    DuplicateVersion {
        /// Identifier of the duplicate row.
        id: ObjectId,
        /// Version of the duplicate row.
        version: u32,
    },

    /// Expected row missing.
    #[error("row not found: {what}")]
    RowNotFound {
        /// Description of the missing row.
        what: String,
    },

    /// The stored schema version is out of the supported range; the
    /// connection is refused before any write.
    #[error("unsupported schema version {found} (supported {oldest}..={expected})")]
    UnknownSchemaVersion {
        /// Version found in the store.
        found: u32,
        /// Oldest version this code can migrate from.
        oldest: u32,
        /// Version this code expects.
        expected: u32,
    },

    /// A schema upgrade step failed; the whole upgrade was rolled back.
    #[error("migration failed: {message}")]
    MigrationFailed {
        /// Description of the failure.
        message: String,
    },

    /// Stored data violates an invariant.
    #[error("integrity error: {message}")]
    Integrity {
        /// Description of the violation.
        message: String,
    },
}

impl StoreError {
    /// Creates a connectivity error.
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity(message.into())
    }

    /// Creates a transaction-misuse error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Creates a row-not-found error.
    pub fn row_not_found(what: impl Into<String>) -> Self {
        Self::RowNotFound { what: what.into() }
    }

    /// Creates a migration-failed error.
    pub fn migration_failed(message: impl Into<String>) -> Self {
        Self::MigrationFailed {
            message: message.into(),
        }
    }

    /// Creates an integrity error.
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }
}
