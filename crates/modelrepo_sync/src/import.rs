//! The import pipeline.
//!
//! Importing materializes one model generation from its rows, one object
//! per [`Importer::next`] call so the caller can interleave progress
//! reporting. Kinds are processed in a fixed order (classification
//! profiles, folders, elements, relationships, views, view nodes, view
//! connections, images) so parents strictly precede children; an entry
//! whose parent has not materialized yet is requeued. References an object
//! holds to something not yet in the graph are parked in the model's
//! deferred-reference registry and checked once at the end; a reference
//! still dangling then is a fatal integrity error.

use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use modelrepo_model::{
    AnyObject, Model, ObjectId, ObjectKind, RefRole, VersionRecord, VersionedMetadata,
};
use modelrepo_store::{materialize, ContentRow, ModelStore};

use crate::error::{SyncError, SyncResult};
use crate::progress::ProgressReporter;

/// Containment rows fetched per store round trip during import.
pub const PAGE_SIZE: usize = 256;

/// Reads one object version together with its child rows.
pub(crate) fn fetch_object(
    store: &dyn ModelStore,
    kind: ObjectKind,
    id: ObjectId,
    version: u32,
) -> SyncResult<AnyObject> {
    let row = store.object_at(kind, id, version)?.ok_or_else(|| {
        SyncError::integrity(format!("missing {} {id} v{version}", kind.label()))
    })?;
    let properties = store.properties_of(id, version)?;
    let features = store.features_of(id, version)?;
    let bendpoints = store.bendpoints_of(id, version)?;
    Ok(materialize(&row, &properties, &features, &bendpoints)?)
}

/// A paged, cursor-style import of one model generation.
pub struct Importer<'a> {
    store: &'a dyn ModelStore,
    model: Model,
    queue: VecDeque<(ObjectKind, ContentRow)>,
    rows: Vec<(ObjectKind, ContentRow)>,
    total: usize,
    completed: usize,
}

impl<'a> Importer<'a> {
    /// Loads the model row and the containment plan for one generation.
    ///
    /// `generation` defaults to the store's latest generation of the model.
    ///
    /// # Errors
    ///
    /// Fails if the model row does not exist or the store fails.
    pub fn prepare(
        store: &'a dyn ModelStore,
        model_id: ObjectId,
        generation: Option<u32>,
    ) -> SyncResult<Self> {
        let generation = match generation {
            Some(generation) => generation,
            None => store
                .latest_model_version(model_id)?
                .ok_or_else(|| SyncError::integrity(format!("model {model_id} not in store")))?,
        };
        let row = store.model_at(model_id, generation)?.ok_or_else(|| {
            SyncError::integrity(format!("model {model_id} has no version {generation}"))
        })?;

        let mut model = Model::with_id(model_id, row.name);
        model.purpose = row.purpose;
        model.metadata = VersionedMetadata::imported(VersionRecord {
            version: row.version,
            checksum: row.checksum,
            container_checksum: None,
            timestamp: row.created_at,
        });

        let mut queue = VecDeque::new();
        for kind in ObjectKind::ALL {
            let mut offset = 0;
            loop {
                let page = store.contents_of(model_id, generation, kind, offset, PAGE_SIZE)?;
                if page.is_empty() {
                    break;
                }
                offset += page.len();
                queue.extend(page.into_iter().map(|row| (kind, row)));
            }
        }

        let total = queue.len();
        debug!(model = %model_id, generation, objects = total, "import prepared");
        Ok(Self {
            store,
            model,
            queue,
            rows: Vec::with_capacity(total),
            total,
            completed: 0,
        })
    }

    /// Number of objects this import will materialize.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of objects materialized so far.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Materializes the next object. Returns false when the plan is done.
    ///
    /// # Errors
    ///
    /// Fails on store errors and on containment that can never resolve
    /// (an entry whose parent is in no generation of the plan).
    pub fn next(&mut self) -> SyncResult<bool> {
        let mut requeued = 0usize;
        while let Some((kind, row)) = self.queue.pop_front() {
            let parent_missing = row
                .parent
                .is_some_and(|parent| !self.model.contains(parent));
            if parent_missing {
                requeued += 1;
                if requeued > self.queue.len() + 1 {
                    return Err(SyncError::integrity(format!(
                        "containment parent of {} never materializes",
                        row.object
                    )));
                }
                self.queue.push_back((kind, row));
                continue;
            }

            let object = fetch_object(self.store, kind, row.object, row.object_version)?;
            self.register_deferred(&object);
            self.model.insert_object(object, row.parent)?;
            self.rows.push((kind, row));
            self.completed += 1;
            return Ok(true);
        }
        Ok(false)
    }

    /// Parks every reference the object holds to something not yet in the
    /// graph.
    fn register_deferred(&mut self, object: &AnyObject) {
        let waiting = object.id();
        let mut park = Vec::new();
        match object {
            AnyObject::Relationship(relationship) => {
                park.push((relationship.source, RefRole::RelationshipSource));
                park.push((relationship.target, RefRole::RelationshipTarget));
            }
            AnyObject::ViewNode(node) => {
                if let Some(element) = node.element {
                    park.push((element, RefRole::ViewNodeElement));
                }
            }
            AnyObject::ViewConnection(connection) => {
                if let Some(relationship) = connection.relationship {
                    park.push((relationship, RefRole::ConnectionRelationship));
                }
                park.push((connection.source, RefRole::ConnectionSource));
                park.push((connection.target, RefRole::ConnectionTarget));
            }
            _ => {}
        }
        for (awaited, role) in park {
            if !self.model.contains(awaited) {
                self.model.pending_refs().defer(awaited, waiting, role);
            }
        }
    }

    /// Resolves deferred references and restores containment ordering.
    ///
    /// # Errors
    ///
    /// Fails with [`SyncError::UnresolvedReference`] if any endpoint never
    /// materialized.
    pub fn finish(mut self) -> SyncResult<Model> {
        let mut refs = std::mem::take(self.model.pending_refs());
        let unresolved = {
            let model = &self.model;
            refs.resolve(|id| model.contains(id))
        };
        if let Some((awaited, pending)) = unresolved.into_iter().next() {
            return Err(SyncError::UnresolvedReference {
                waiting: pending.waiting,
                awaited,
            });
        }
        self.restore_ranks();
        Ok(self.model)
    }

    /// Rewrites every containment list in stored rank order.
    ///
    /// Objects are inserted kind by kind, which appends siblings of
    /// different kinds out of their original interleaving; the junction
    /// rows carry the true order.
    fn restore_ranks(&mut self) {
        let mut by_parent: BTreeMap<ObjectId, Vec<(u32, ObjectId, ObjectKind)>> = BTreeMap::new();
        for (kind, row) in &self.rows {
            if let Some(parent) = row.parent {
                by_parent
                    .entry(parent)
                    .or_default()
                    .push((row.rank, row.object, *kind));
            }
        }
        for (parent, mut entries) in by_parent {
            entries.sort_by_key(|(rank, _, _)| *rank);
            if let Some(folder) = self.model.folder_mut(parent) {
                folder.children = entries.iter().map(|(_, id, _)| *id).collect();
            } else if let Some(view) = self.model.view_mut(parent) {
                view.nodes = entries
                    .iter()
                    .filter(|(_, _, kind)| *kind == ObjectKind::ViewNode)
                    .map(|(_, id, _)| *id)
                    .collect();
                view.connections = entries
                    .iter()
                    .filter(|(_, _, kind)| *kind == ObjectKind::ViewConnection)
                    .map(|(_, id, _)| *id)
                    .collect();
            } else if let Some(node) = self.model.view_node_mut(parent) {
                node.children = entries.iter().map(|(_, id, _)| *id).collect();
            }
        }
    }
}

/// Imports one model generation in a single call, reporting progress per
/// object.
///
/// # Errors
///
/// Fails on store errors, unresolved references, or cancellation.
pub fn import_model(
    store: &dyn ModelStore,
    model_id: ObjectId,
    generation: Option<u32>,
    progress: &mut dyn ProgressReporter,
) -> SyncResult<Model> {
    let mut importer = Importer::prepare(store, model_id, generation)?;
    let total = importer.total();
    while importer.next()? {
        progress.set_progress("import", importer.completed(), total);
        if progress.is_cancelled() {
            return Err(SyncError::Cancelled { phase: "import" });
        }
    }
    importer.finish()
}
