//! The export pipeline.
//!
//! Exporting writes one new model generation: remote deletions and remote
//! updates are first mirrored into the in-memory graph as reversible
//! edits, then every object needing a write gets a fresh version number
//! and its rows go to the store inside one transaction. On any failure
//! the transaction rolls back and the in-memory edits are undone as one
//! unit; only after a successful commit do the local baselines move
//! forward.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use modelrepo_model::{
    now_millis, AnyObject, CompoundEdit, ConflictChoice, Model, ModelEdit, ObjectId, ObjectKind,
    SyncStatus,
};
use modelrepo_store::{deconstruct, ContentRow, ModelRow, ModelStore};

use crate::compare::compare;
use crate::conflict;
use crate::error::{SyncError, SyncResult};
use crate::import::fetch_object;
use crate::progress::ProgressReporter;

/// How one export attempt ended.
#[derive(Debug, PartialEq, Eq)]
pub enum ExportOutcome {
    /// A new generation was committed.
    Exported {
        /// The generation number that was written.
        generation: u32,
    },
    /// The model and the store already agree.
    NothingToExport,
    /// Conflicts await user choices; call export again once they are
    /// resolved.
    Suspended {
        /// Number of unresolved conflicts.
        conflicts: usize,
    },
}

/// Runs one export attempt of `model` against `store`.
///
/// Re-entrant: an attempt suspended on conflicts can be repeated after
/// resolving them and resumes where it left off.
///
/// # Errors
///
/// Store failures during the write roll the transaction back, undo the
/// in-memory edits, and surface the original error. If undoing itself
/// fails the model is flagged inconsistent and
/// [`SyncError::ModelInconsistent`] is returned instead.
pub fn export(
    model: &mut Model,
    store: &mut dyn ModelStore,
    user: &str,
    progress: &mut dyn ProgressReporter,
) -> SyncResult<ExportOutcome> {
    // Phase 1: compare; bail out early when nothing differs.
    let report = compare(model, store, progress)?;
    if !report.has_changes() {
        debug!("nothing to export");
        return Ok(ExportOutcome::NothingToExport);
    }

    // Phase 2: suspend while conflicts await the user.
    let pending = conflict::unresolved_count(model);
    if pending > 0 {
        info!(conflicts = pending, "export suspended on conflicts");
        return Ok(ExportOutcome::Suspended { conflicts: pending });
    }

    let latest_generation = store.latest_model_version(model.id())?;

    // Phases 3 and 4: mirror remote deletions and remote content into the
    // graph as one reversible unit.
    let mut compound = CompoundEdit::new();
    if let Err(error) = stage_remote_changes(model, store, &mut compound, latest_generation) {
        return Err(revert_or_flag(model, compound, error));
    }

    // Phase 5: the imports alone may have made the model fully synced.
    let timestamp = now_millis();
    model.refresh_checksums(timestamp);
    if !anything_to_export(model) {
        debug!("imports absorbed all differences; nothing to write");
        // The graph now matches the store's newest generation; make that
        // generation the model's own baseline so the next comparison
        // reads the right junction rows.
        let latest = model.metadata.latest_database.clone();
        if latest.is_persisted() {
            model.metadata.adopt(latest);
        }
        model.clear_absent();
        return Ok(ExportOutcome::NothingToExport);
    }

    // Phase 6: folder-move reconciliation.
    if let Err(error) = rehome_remote_moves(model, store, &mut compound, latest_generation) {
        return Err(revert_or_flag(model, compound, error));
    }
    model.refresh_checksums(timestamp);

    // Phases 7 and 8: write the new generation in one transaction.
    let new_generation = latest_generation.unwrap_or(0) + 1;
    store.begin()?;
    if let Err(error) = write_generation(model, store, user, timestamp, new_generation, progress) {
        if let Err(rollback_error) = store.rollback() {
            warn!(%rollback_error, "rollback after failed export also failed");
        }
        return Err(revert_or_flag(model, compound, error));
    }
    if let Err(error) = store.commit() {
        return Err(revert_or_flag(model, compound, error.into()));
    }
    info!(generation = new_generation, "export committed");

    // Phase 9: the store is ahead now; move the local baselines forward.
    // Failures past this point never re-attempt the commit.
    promote_baselines(model, new_generation);
    Ok(ExportOutcome::Exported {
        generation: new_generation,
    })
}

/// Reverts the compound edit after a failure, preferring the inconsistency
/// signal if reverting itself fails.
fn revert_or_flag(model: &mut Model, compound: CompoundEdit, error: SyncError) -> SyncError {
    if compound.revert(model).is_err() {
        return SyncError::ModelInconsistent;
    }
    error
}

fn stage_remote_changes(
    model: &mut Model,
    store: &dyn ModelStore,
    compound: &mut CompoundEdit,
    latest_generation: Option<u32>,
) -> SyncResult<()> {
    // Remote deletions, children before parents.
    for kind in ObjectKind::ALL.into_iter().rev() {
        for id in model.ids_of(kind) {
            let deleted = model
                .object_metadata(kind, id)
                .is_some_and(|md| md.sync_status() == SyncStatus::DeletedInDatabase);
            if deleted {
                compound.apply(model, ModelEdit::remove(kind, id))?;
                model.clear_conflict(id);
            }
        }
    }

    // Remote updates and import-from-database resolutions.
    for kind in ObjectKind::ALL {
        for id in model.ids_of(kind) {
            let Some(metadata) = model.object_metadata(kind, id) else {
                continue;
            };
            let status = metadata.sync_status();
            let import_resolution =
                model.conflict_choice(id) == Some(ConflictChoice::ImportFromDatabase);
            if status != SyncStatus::UpdatedInDatabase && !import_resolution {
                continue;
            }
            let stamp = store
                .latest_stamp(kind, id)?
                .ok_or_else(|| SyncError::integrity(format!("{id} vanished from the store")))?;
            let mut incoming = fetch_object(store, kind, id, stamp.version)?;
            merge_containment(model, &mut incoming);
            compound.apply(model, ModelEdit::replace(incoming))?;
            model.clear_conflict(id);
        }
    }

    // Remote-only objects, parents before children.
    let Some(generation) = latest_generation else {
        return Ok(());
    };
    let mut queue: VecDeque<(ObjectKind, ObjectId, u32)> = VecDeque::new();
    for kind in ObjectKind::ALL {
        for (id, metadata) in model.absent_of(kind) {
            if metadata.sync_status() == SyncStatus::NewInDatabase {
                queue.push_back((kind, id, metadata.latest_database.version));
            }
        }
    }
    let mut requeued = 0usize;
    while let Some((kind, id, version)) = queue.pop_front() {
        let entry = store.content_entry(model.id(), generation, id)?;
        let parent = entry.as_ref().and_then(|row| row.parent);
        if parent.is_some_and(|parent| !model.contains(parent)) {
            requeued += 1;
            if requeued > queue.len() + 1 {
                return Err(SyncError::integrity(format!(
                    "containment parent of {id} never materializes"
                )));
            }
            queue.push_back((kind, id, version));
            continue;
        }
        requeued = 0;
        let object = fetch_object(store, kind, id, version)?;
        compound.apply(model, ModelEdit::insert(object, parent))?;
    }
    Ok(())
}

/// Copies the live containment lists into a freshly materialized object,
/// which arrives with empty lists.
fn merge_containment(model: &Model, incoming: &mut AnyObject) {
    match incoming {
        AnyObject::Folder(folder) => {
            if let Some(existing) = model.folder(folder.id) {
                folder.children = existing.children.clone();
            }
        }
        AnyObject::View(view) => {
            if let Some(existing) = model.view(view.id) {
                view.nodes = existing.nodes.clone();
                view.connections = existing.connections.clone();
            }
        }
        AnyObject::ViewNode(node) => {
            if let Some(existing) = model.view_node(node.id) {
                node.children = existing.children.clone();
            }
        }
        _ => {}
    }
}

/// Returns true if committing a new generation would record anything the
/// store does not already have.
fn anything_to_export(model: &Model) -> bool {
    let model_status = model.metadata.sync_status();
    if model_status.needs_export() || model_status.is_conflicting() {
        return true;
    }
    for kind in ObjectKind::ALL {
        for id in model.ids_of(kind) {
            let Some(metadata) = model.object_metadata(kind, id) else {
                continue;
            };
            let status = metadata.sync_status();
            if status.needs_export() || status.is_conflicting() {
                return true;
            }
        }
        // Local deletions are exported by omission from the new
        // generation's junction rows.
        if model
            .absent_of(kind)
            .iter()
            .any(|(_, md)| md.sync_status() == SyncStatus::DeletedInModel)
        {
            return true;
        }
    }
    false
}

fn rehome_remote_moves(
    model: &mut Model,
    store: &dyn ModelStore,
    compound: &mut CompoundEdit,
    latest_generation: Option<u32>,
) -> SyncResult<()> {
    let generation = model.generation();
    let Some(latest) = latest_generation else {
        return Ok(());
    };
    if generation == 0 || latest <= generation {
        return Ok(());
    }
    let model_id = model.id();
    for kind in [
        ObjectKind::Folder,
        ObjectKind::Element,
        ObjectKind::Relationship,
        ObjectKind::View,
    ] {
        for id in model.ids_of(kind) {
            let Some(initial_entry) = store.content_entry(model_id, generation, id)? else {
                continue;
            };
            let Some(latest_entry) = store.content_entry(model_id, latest, id)? else {
                continue;
            };
            if initial_entry.parent == latest_entry.parent {
                continue;
            }
            // A local move wins over the remote one.
            let current_parent = model.locate_parent(id).map(|(parent, _)| parent);
            if current_parent != initial_entry.parent {
                continue;
            }
            if let Some(target) = latest_entry.parent {
                if model.folder(target).is_some() {
                    debug!(%id, %target, "following remote folder move");
                    compound.apply(model, ModelEdit::rehome(id, target))?;
                }
            }
        }
    }
    Ok(())
}

/// One containment edge scheduled for the new generation.
struct Placement {
    kind: ObjectKind,
    id: ObjectId,
    parent: Option<ObjectId>,
    rank: u32,
}

fn collect_placements(model: &Model) -> Vec<Placement> {
    let mut placements = Vec::new();
    for (rank, id) in model.ids_of(ObjectKind::Profile).into_iter().enumerate() {
        placements.push(Placement {
            kind: ObjectKind::Profile,
            id,
            parent: None,
            rank: rank as u32,
        });
    }
    for (rank, root) in model.root_folders().iter().enumerate() {
        placements.push(Placement {
            kind: ObjectKind::Folder,
            id: *root,
            parent: None,
            rank: rank as u32,
        });
    }
    let roots: Vec<ObjectId> = model.root_folders().to_vec();
    for root in roots {
        walk_folder(model, root, &mut placements);
    }
    for (rank, id) in model.ids_of(ObjectKind::Image).into_iter().enumerate() {
        placements.push(Placement {
            kind: ObjectKind::Image,
            id,
            parent: None,
            rank: rank as u32,
        });
    }
    placements
}

fn walk_folder(model: &Model, folder_id: ObjectId, placements: &mut Vec<Placement>) {
    let Some(folder) = model.folder(folder_id) else {
        return;
    };
    for (rank, child) in folder.children.iter().enumerate() {
        let Some(kind) = model.kind_of(*child) else {
            continue;
        };
        placements.push(Placement {
            kind,
            id: *child,
            parent: Some(folder_id),
            rank: rank as u32,
        });
        match kind {
            ObjectKind::Folder => walk_folder(model, *child, placements),
            ObjectKind::View => walk_view(model, *child, placements),
            _ => {}
        }
    }
}

fn walk_view(model: &Model, view_id: ObjectId, placements: &mut Vec<Placement>) {
    let Some(view) = model.view(view_id) else {
        return;
    };
    for (rank, node) in view.nodes.iter().enumerate() {
        placements.push(Placement {
            kind: ObjectKind::ViewNode,
            id: *node,
            parent: Some(view_id),
            rank: rank as u32,
        });
        walk_node(model, *node, placements);
    }
    for (rank, connection) in view.connections.iter().enumerate() {
        placements.push(Placement {
            kind: ObjectKind::ViewConnection,
            id: *connection,
            parent: Some(view_id),
            rank: rank as u32,
        });
    }
}

fn walk_node(model: &Model, node_id: ObjectId, placements: &mut Vec<Placement>) {
    let Some(node) = model.view_node(node_id) else {
        return;
    };
    for (rank, child) in node.children.iter().enumerate() {
        placements.push(Placement {
            kind: ObjectKind::ViewNode,
            id: *child,
            parent: Some(node_id),
            rank: rank as u32,
        });
        walk_node(model, *child, placements);
    }
}

fn write_generation(
    model: &mut Model,
    store: &mut dyn ModelStore,
    user: &str,
    timestamp: u64,
    new_generation: u32,
    progress: &mut dyn ProgressReporter,
) -> SyncResult<()> {
    model.metadata.current.version = new_generation;
    store.insert_model(ModelRow {
        id: model.id(),
        version: new_generation,
        name: model.name.clone(),
        purpose: model.purpose.clone(),
        checksum: model.metadata.current.checksum.clone(),
        created_by: user.to_string(),
        created_at: timestamp,
    })?;

    let placements = collect_placements(model);

    // Containers before contents: one pass per kind in pipeline order.
    for (step, kind) in ObjectKind::ALL.into_iter().enumerate() {
        progress.set_progress(kind.label(), step, ObjectKind::ALL.len());
        if progress.is_cancelled() {
            return Err(SyncError::Cancelled { phase: "export" });
        }
        for placement in placements.iter().filter(|p| p.kind == kind) {
            write_placement(model, store, user, timestamp, new_generation, placement)?;
        }
    }
    Ok(())
}

fn write_placement(
    model: &mut Model,
    store: &mut dyn ModelStore,
    user: &str,
    timestamp: u64,
    new_generation: u32,
    placement: &Placement,
) -> SyncResult<()> {
    let Placement {
        kind, id, parent, rank,
    } = *placement;
    let Some(metadata) = model.object_metadata(kind, id) else {
        return Ok(());
    };
    let status = metadata.sync_status();
    let choice = model.conflict_choice(id);
    let hold_back = choice == Some(ConflictChoice::DoNotExport);
    let export_resolved = choice == Some(ConflictChoice::ExportToDatabase);
    let write_new =
        !hold_back && (status.needs_export() || (status.is_conflicting() && export_resolved));

    let object_version = if write_new {
        let next = metadata.latest_database.version + 1;
        if let Some(metadata) = model.object_metadata_mut(kind, id) {
            metadata.current.version = next;
            metadata.current.timestamp = timestamp;
        }
        let object = model
            .any_object(kind, id)
            .ok_or_else(|| SyncError::integrity(format!("{id} disappeared mid-export")))?;
        if kind == ObjectKind::Image {
            ensure_unique_image_path(store, &object)?;
        }
        let parts = deconstruct(&object, user, timestamp);
        store.insert_object(parts.row)?;
        store.insert_properties(parts.properties)?;
        store.insert_features(parts.features)?;
        store.insert_bendpoints(parts.bendpoints)?;
        next
    } else if hold_back {
        // The remote version stays authoritative for this generation.
        metadata.latest_database.version
    } else if metadata.database.is_persisted() {
        metadata.database.version
    } else if metadata.initial.is_persisted() {
        metadata.initial.version
    } else {
        metadata.latest_database.version
    };

    store.insert_content(ContentRow {
        model: model.id(),
        model_version: new_generation,
        kind,
        object: id,
        object_version,
        parent,
        rank,
    })?;
    Ok(())
}

/// Image paths are unique in the store; a clashing path under a different
/// identifier is an integrity error, not a silent overwrite.
fn ensure_unique_image_path(store: &dyn ModelStore, object: &AnyObject) -> SyncResult<()> {
    if let AnyObject::Image(image) = object {
        if store.image_path_taken(&image.path, image.id)? {
            return Err(SyncError::integrity(format!(
                "image path {} already belongs to another image",
                image.path
            )));
        }
    }
    Ok(())
}

fn promote_baselines(model: &mut Model, new_generation: u32) {
    model.metadata.current.version = new_generation;
    model.metadata.promote_current();
    for kind in ObjectKind::ALL {
        for id in model.ids_of(kind) {
            // Objects held back with a do-not-export choice keep their
            // baselines so the next comparison flags them again.
            if model.conflict_choice(id) == Some(ConflictChoice::DoNotExport) {
                continue;
            }
            let Some(metadata) = model.object_metadata_mut(kind, id) else {
                continue;
            };
            if metadata.sync_status().needs_export() || metadata.sync_status().is_conflicting() {
                metadata.promote_current();
            }
        }
    }
    model.clear_conflicts();
    model.clear_absent();
}
