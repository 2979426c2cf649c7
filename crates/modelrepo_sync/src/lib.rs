//! # ModelRepo Sync
//!
//! The synchronization engine between an in-memory model graph and its
//! backing store.
//!
//! The engine has three entry points:
//! - [`compare`] refreshes every version record against the store and
//!   derives per-object synchronization statuses
//! - [`import_model`] materializes a model generation from store rows,
//!   resolving forward references and restoring containment order
//! - [`export`] writes a new model generation transactionally, mirroring
//!   remote changes into the graph first as reversible edits
//!
//! Conflicts detected by comparison suspend an export until the user has
//! chosen a resolution per object (see the [`conflict`] module).

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod compare;
pub mod conflict;
mod error;
mod export;
mod import;
mod progress;

pub use compare::{compare, CompareReport, StatusCounts};
pub use conflict::{pending_conflicts, resolve, resolve_all, unresolved_count};
pub use error::{SyncError, SyncResult};
pub use export::{export, ExportOutcome};
pub use import::{import_model, Importer, PAGE_SIZE};
pub use progress::{NullProgress, ProgressReporter};
