//! The comparison engine.
//!
//! Comparison is the read-only pass that brings every object's four version
//! records up to date against the store and derives its synchronization
//! status. It never writes to the store; its side effects on the model are
//! the refreshed metadata, the store-only ("absent") records the import
//! pipeline consumes, and default conflict choices.

use std::collections::BTreeMap;

use tracing::debug;

use modelrepo_model::{
    now_millis, ConflictChoice, Model, ObjectId, ObjectKind, SyncStatus, VersionRecord,
    VersionedMetadata,
};
use modelrepo_store::{ModelStore, VersionStamp};

use crate::error::{SyncError, SyncResult};
use crate::progress::ProgressReporter;

/// Number of objects per synchronization status.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusCounts {
    /// Objects requiring no action.
    pub synced: usize,
    /// Created locally, never exported.
    pub new_in_model: usize,
    /// Updated locally only.
    pub updated_in_model: usize,
    /// Updated remotely only.
    pub updated_in_database: usize,
    /// Created remotely, unknown to this model.
    pub new_in_database: usize,
    /// Deleted locally, still in the store.
    pub deleted_in_model: usize,
    /// Deleted remotely, still in memory.
    pub deleted_in_database: usize,
    /// Updated on both sides.
    pub conflicting: usize,
}

impl StatusCounts {
    fn record(&mut self, status: SyncStatus) {
        match status {
            SyncStatus::Synced => self.synced += 1,
            SyncStatus::NewInModel => self.new_in_model += 1,
            SyncStatus::UpdatedInModel => self.updated_in_model += 1,
            SyncStatus::UpdatedInDatabase => self.updated_in_database += 1,
            SyncStatus::NewInDatabase => self.new_in_database += 1,
            SyncStatus::DeletedInModel => self.deleted_in_model += 1,
            SyncStatus::DeletedInDatabase => self.deleted_in_database += 1,
            SyncStatus::Conflicting => self.conflicting += 1,
        }
    }

    fn merge(&mut self, other: &StatusCounts) {
        self.synced += other.synced;
        self.new_in_model += other.new_in_model;
        self.updated_in_model += other.updated_in_model;
        self.updated_in_database += other.updated_in_database;
        self.new_in_database += other.new_in_database;
        self.deleted_in_model += other.deleted_in_model;
        self.deleted_in_database += other.deleted_in_database;
        self.conflicting += other.conflicting;
    }

    /// Number of objects in any non-synced status.
    #[must_use]
    pub fn changed(&self) -> usize {
        self.new_in_model
            + self.updated_in_model
            + self.updated_in_database
            + self.new_in_database
            + self.deleted_in_model
            + self.deleted_in_database
            + self.conflicting
    }
}

/// The outcome of one comparison pass.
#[derive(Debug, Default)]
pub struct CompareReport {
    /// Counts per object kind.
    pub per_kind: BTreeMap<ObjectKind, StatusCounts>,
    /// Counts summed over every kind.
    pub totals: StatusCounts,
    /// Status of the model row itself.
    pub model_status: SyncStatus,
    /// Views whose subtree checksum differs from the stored one.
    pub changed_view_subtrees: Vec<ObjectId>,
}

impl CompareReport {
    /// Returns true if exporting or importing would do anything.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.totals.changed() > 0 || !self.model_status.is_synced()
    }

    /// Number of conflicting objects.
    #[must_use]
    pub fn conflict_count(&self) -> usize {
        self.totals.conflicting
    }
}

fn stamp_map(stamps: Vec<VersionStamp>) -> BTreeMap<ObjectId, VersionStamp> {
    stamps.into_iter().map(|stamp| (stamp.id, stamp)).collect()
}

/// Runs one comparison pass of `model` against `store`.
///
/// Populates `database` and `latest_database` records on every in-memory
/// object, synthesizes absent records for store-only objects, defaults the
/// conflict choice of newly conflicting objects (folders auto-resolve to
/// export), and returns per-kind counts.
///
/// # Errors
///
/// Fails on store errors, on a cancelled progress reporter, and on a model
/// flagged inconsistent.
pub fn compare(
    model: &mut Model,
    store: &dyn ModelStore,
    progress: &mut dyn ProgressReporter,
) -> SyncResult<CompareReport> {
    if !model.is_consistent() {
        return Err(SyncError::ModelInconsistent);
    }

    model.clear_absent();
    model.refresh_checksums(now_millis());

    let model_id = model.id();
    let generation = model.generation();
    let latest_generation = store.latest_model_version(model_id)?;

    refresh_model_records(model, store, generation, latest_generation)?;

    let mut report = CompareReport {
        model_status: model.metadata.sync_status(),
        ..CompareReport::default()
    };

    for (step, kind) in ObjectKind::ALL.into_iter().enumerate() {
        progress.set_progress(kind.label(), step, ObjectKind::ALL.len());
        if progress.is_cancelled() {
            return Err(SyncError::Cancelled { phase: "compare" });
        }

        let own = if generation > 0 {
            stamp_map(store.stamps_in_generation(model_id, generation, kind)?)
        } else {
            BTreeMap::new()
        };
        let newest = match latest_generation {
            Some(gen) => stamp_map(store.stamps_in_generation(model_id, gen, kind)?),
            None => BTreeMap::new(),
        };

        refresh_object_records(model, store, kind, &own, &newest)?;
        adopt_shared_objects(model, store, kind)?;
        synthesize_absent(model, store, kind, generation, &newest)?;

        let counts = classify_kind(model, kind);
        report.totals.merge(&counts);
        report.per_kind.insert(kind, counts);
    }

    for id in model.ids_of(ObjectKind::View) {
        let changed = model
            .object_metadata(ObjectKind::View, id)
            .is_some_and(|md| !md.current.same_container_checksum(&md.database));
        if changed {
            report.changed_view_subtrees.push(id);
        }
    }

    debug!(
        changed = report.totals.changed(),
        conflicting = report.totals.conflicting,
        "comparison finished"
    );
    Ok(report)
}

fn refresh_model_records(
    model: &mut Model,
    store: &dyn ModelStore,
    generation: u32,
    latest_generation: Option<u32>,
) -> SyncResult<()> {
    let model_id = model.id();
    if generation > 0 {
        if let Some(row) = store.model_at(model_id, generation)? {
            model.metadata.database = VersionRecord {
                version: row.version,
                checksum: row.checksum,
                container_checksum: None,
                timestamp: row.created_at,
            };
        }
    }
    if let Some(latest) = latest_generation {
        if let Some(row) = store.model_at(model_id, latest)? {
            model.metadata.latest_database = VersionRecord {
                version: row.version,
                checksum: row.checksum,
                container_checksum: None,
                timestamp: row.created_at,
            };
        }
    }
    Ok(())
}

fn refresh_object_records(
    model: &mut Model,
    store: &dyn ModelStore,
    kind: ObjectKind,
    own: &BTreeMap<ObjectId, VersionStamp>,
    newest: &BTreeMap<ObjectId, VersionStamp>,
) -> SyncResult<()> {
    for id in model.ids_of(kind) {
        let own_stamp = own.get(&id);
        let in_newest = newest.contains_key(&id);
        let latest = store.latest_stamp(kind, id)?;

        let Some(metadata) = model.object_metadata_mut(kind, id) else {
            continue;
        };
        metadata.database = match own_stamp {
            // Present in the store's newest generation: alive remotely.
            Some(stamp) if in_newest => stamp.to_record(),
            // In our generation but gone from the newest one: deleted
            // remotely. An unset database record encodes that.
            Some(_) => VersionRecord::new(),
            None => VersionRecord::new(),
        };
        metadata.latest_database = match latest {
            Some(stamp) => stamp.to_record(),
            None => VersionRecord::new(),
        };
    }
    Ok(())
}

/// The cross-model sharing pass.
///
/// An object the user pasted from another model carries content that may
/// already exist in the store under the same identifier. If the stored
/// content matches ours byte for byte, the store's version is adopted as
/// our baseline instead of exporting a duplicate; if it differs, the
/// object is a conflict.
fn adopt_shared_objects(
    model: &mut Model,
    store: &dyn ModelStore,
    kind: ObjectKind,
) -> SyncResult<()> {
    for id in model.ids_of(kind) {
        let unseen = model
            .object_metadata(kind, id)
            .is_some_and(|md| !md.initial.is_persisted());
        if !unseen {
            continue;
        }
        let Some(latest) = store.latest_stamp(kind, id)? else {
            continue;
        };
        let record = latest.to_record();
        if let Some(metadata) = model.object_metadata_mut(kind, id) {
            if metadata.current.same_checksum(&record) {
                metadata.adopt(record);
            } else {
                metadata.latest_database = record;
            }
        }
    }
    Ok(())
}

fn synthesize_absent(
    model: &mut Model,
    store: &dyn ModelStore,
    kind: ObjectKind,
    generation: u32,
    newest: &BTreeMap<ObjectId, VersionStamp>,
) -> SyncResult<()> {
    let model_id = model.id();
    for (id, stamp) in newest {
        if model.contains(*id) {
            continue;
        }
        let initial = if generation > 0 {
            store
                .stamp_in_generation(model_id, generation, kind, *id)?
                .map(|s| s.to_record())
                .unwrap_or_default()
        } else {
            VersionRecord::default()
        };
        model.set_absent(kind, *id, VersionedMetadata::absent(initial, stamp.to_record()));
    }
    Ok(())
}

fn classify_kind(model: &mut Model, kind: ObjectKind) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for id in model.ids_of(kind) {
        let Some(status) = model.object_metadata(kind, id).map(VersionedMetadata::sync_status)
        else {
            continue;
        };
        counts.record(status);
        if status.is_conflicting() {
            if kind == ObjectKind::Folder {
                // Folder content is just a name and a position; diverging
                // copies are resolved by exporting ours.
                model.set_conflict_choice(id, ConflictChoice::ExportToDatabase);
            } else if model.conflict_choice(id).is_none() {
                model.set_conflict_choice(id, ConflictChoice::AskUser);
            }
        } else {
            model.clear_conflict(id);
        }
    }
    let absent_statuses: Vec<SyncStatus> = model
        .absent_of(kind)
        .into_iter()
        .map(|(_, metadata)| metadata.sync_status())
        .collect();
    for status in absent_statuses {
        counts.record(status);
    }
    counts
}
