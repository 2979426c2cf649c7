//! # Modelrepo Store
//!
//! Relational boundary of the model repository.
//!
//! This crate defines the row types exchanged with the backing store, the
//! [`ModelStore`] trait the synchronization engine talks to, an in-memory
//! reference implementation, and the dialect-aware schema with its
//! sequential upgrade engine.
//!
//! ## Design Principles
//!
//! - Rows are insert-only: every write creates a new `(id, version)` key,
//!   history is never erased
//! - All writes happen inside an explicit transaction
//! - The schema is defined once, dialect differences are confined to
//!   column types and `ADD COLUMN` syntax
//!
//! ## Example
//!
//! ```rust
//! use modelrepo_store::{MemoryStore, ModelStore};
//!
//! let mut store = MemoryStore::new();
//! store.begin().unwrap();
//! store.rollback().unwrap();
//! assert!(!store.in_transaction());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod dialect;
mod error;
mod memory;
mod migration;
mod rows;
mod schema;
mod store;

pub use dialect::{ColumnType, Dialect};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use migration::{
    SchemaUpgrader, UpgradeStep, EXPECTED_SCHEMA_VERSION, OLDEST_SUPPORTED_SCHEMA_VERSION,
};
pub use rows::{
    deconstruct, materialize, BendpointRow, ContentRow, FeatureRow, ModelRow, ObjectParts,
    ObjectPayload, ObjectRow, PropertyRow, VersionStamp,
};
pub use schema::{create_schema, junction_table, object_table, repository_tables, ColumnDef, TableDef};
pub use store::ModelStore;
