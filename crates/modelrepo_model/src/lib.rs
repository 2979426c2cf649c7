//! # ModelRepo Model
//!
//! The in-memory object graph for ModelRepo.
//!
//! This crate provides:
//! - Stable object identifiers and per-identifier version records
//! - Versioned-object metadata with synchronization-status derivation
//! - The structural checksum engine (SHA-256 over canonical content)
//! - The closed set of node variants making up a model graph
//! - The model root container with its conflict, pending-reference and
//!   store-only registries
//! - Reversible compound edits used by the export pipeline

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod checksum;
mod edits;
mod error;
mod id;
mod metadata;
mod model;
mod node;
mod pending;
mod version;

pub use checksum::{ChecksumBuilder, Checksummed};
pub use edits::{CompoundEdit, ModelEdit};
pub use error::{ModelError, ModelResult};
pub use id::ObjectId;
pub use metadata::{SyncStatus, VersionedMetadata};
pub use model::{AnyObject, ConflictChoice, Model};
pub use node::{
    Bendpoint, Bounds, Element, Feature, Folder, FolderKind, ImageRef, ModelObject, ObjectKind,
    Profile, Property, Relationship, View, ViewConnection, ViewNode,
};
pub use pending::{PendingRef, PendingRefs, RefRole};
pub use version::{now_millis, VersionRecord};
