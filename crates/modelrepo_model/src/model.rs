//! The model root container.

use crate::checksum::{ChecksumBuilder, Checksummed};
use crate::error::{ModelError, ModelResult};
use crate::id::ObjectId;
use crate::metadata::VersionedMetadata;
use crate::node::{
    Element, Folder, ImageRef, ModelObject, ObjectKind, Profile, Relationship, View,
    ViewConnection, ViewNode,
};
use crate::pending::PendingRefs;
use std::collections::BTreeMap;

/// A user's choice for one conflicting object.
///
/// `AskUser` is the only non-terminal state; the other three are terminal
/// and consumed by the export pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    /// No decision yet; export suspends until one is made.
    AskUser,
    /// Overwrite the store with the local content.
    ExportToDatabase,
    /// Overwrite the local content from the store.
    ImportFromDatabase,
    /// Keep the local content but write nothing.
    DoNotExport,
}

impl ConflictChoice {
    /// Returns true once a decision has been made.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, ConflictChoice::AskUser)
    }
}

/// One object wrapped in its variant tag.
///
/// This is the unit the pipelines move around: edits remove and reinsert
/// whole objects, the import pipeline materializes one per call.
#[derive(Debug, Clone)]
pub enum AnyObject {
    /// A classification profile.
    Profile(Profile),
    /// A folder.
    Folder(Folder),
    /// An element.
    Element(Element),
    /// A relationship.
    Relationship(Relationship),
    /// A view.
    View(View),
    /// A view node.
    ViewNode(ViewNode),
    /// A view connection.
    ViewConnection(ViewConnection),
    /// An image attachment.
    Image(ImageRef),
}

macro_rules! any_dispatch {
    ($self:expr, $name:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            AnyObject::Profile($name) => $name.$method($($arg),*),
            AnyObject::Folder($name) => $name.$method($($arg),*),
            AnyObject::Element($name) => $name.$method($($arg),*),
            AnyObject::Relationship($name) => $name.$method($($arg),*),
            AnyObject::View($name) => $name.$method($($arg),*),
            AnyObject::ViewNode($name) => $name.$method($($arg),*),
            AnyObject::ViewConnection($name) => $name.$method($($arg),*),
            AnyObject::Image($name) => $name.$method($($arg),*),
        }
    };
}

impl AnyObject {
    /// Stable identifier.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        any_dispatch!(self, o, id)
    }

    /// Variant tag.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        any_dispatch!(self, o, kind)
    }

    /// Versioning metadata.
    #[must_use]
    pub fn metadata(&self) -> &VersionedMetadata {
        any_dispatch!(self, o, metadata)
    }

    /// Mutable versioning metadata.
    pub fn metadata_mut(&mut self) -> &mut VersionedMetadata {
        any_dispatch!(self, o, metadata_mut)
    }

    /// Structural checksum of the wrapped object.
    #[must_use]
    pub fn content_checksum(&self) -> String {
        any_dispatch!(self, o, checksum)
    }
}

/// The root container of one in-memory model graph.
///
/// Owns a collection per node kind, the model's own versioning metadata,
/// and the registries the synchronization engine works against: the
/// deferred-reference arena, the per-object conflict choices, and the
/// per-kind "in store but not in model" records produced by comparison.
#[derive(Debug)]
pub struct Model {
    id: ObjectId,
    /// Model name.
    pub name: String,
    /// Free-text purpose statement.
    pub purpose: String,
    /// The model's own version records.
    pub metadata: VersionedMetadata,

    profiles: BTreeMap<ObjectId, Profile>,
    folders: BTreeMap<ObjectId, Folder>,
    elements: BTreeMap<ObjectId, Element>,
    relationships: BTreeMap<ObjectId, Relationship>,
    views: BTreeMap<ObjectId, View>,
    view_nodes: BTreeMap<ObjectId, ViewNode>,
    view_connections: BTreeMap<ObjectId, ViewConnection>,
    images: BTreeMap<ObjectId, ImageRef>,

    root_folders: Vec<ObjectId>,

    pending_refs: PendingRefs,
    conflicts: BTreeMap<ObjectId, ConflictChoice>,
    absent: BTreeMap<ObjectId, VersionedMetadata>,
    absent_kinds: BTreeMap<ObjectId, ObjectKind>,
    inconsistent: bool,
}

impl Model {
    /// Creates a new, locally-created model.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(ObjectId::new(), name)
    }

    /// Creates a model with a known identifier (used by the import
    /// pipeline).
    #[must_use]
    pub fn with_id(id: ObjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            purpose: String::new(),
            metadata: VersionedMetadata::created_in_model(),
            profiles: BTreeMap::new(),
            folders: BTreeMap::new(),
            elements: BTreeMap::new(),
            relationships: BTreeMap::new(),
            views: BTreeMap::new(),
            view_nodes: BTreeMap::new(),
            view_connections: BTreeMap::new(),
            images: BTreeMap::new(),
            root_folders: Vec::new(),
            pending_refs: PendingRefs::new(),
            conflicts: BTreeMap::new(),
            absent: BTreeMap::new(),
            absent_kinds: BTreeMap::new(),
            inconsistent: false,
        }
    }

    /// The model's stable identifier.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The database generation this model last synchronized against
    /// (version number of the model row itself).
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.metadata.database.version
    }

    /// Top-level folders in rank order.
    #[must_use]
    pub fn root_folders(&self) -> &[ObjectId] {
        &self.root_folders
    }

    // ------------------------------------------------------------------
    // Typed access
    // ------------------------------------------------------------------

    /// Looks up a profile.
    #[must_use]
    pub fn profile(&self, id: ObjectId) -> Option<&Profile> {
        self.profiles.get(&id)
    }

    /// Looks up a folder.
    #[must_use]
    pub fn folder(&self, id: ObjectId) -> Option<&Folder> {
        self.folders.get(&id)
    }

    /// Looks up a folder mutably.
    pub fn folder_mut(&mut self, id: ObjectId) -> Option<&mut Folder> {
        self.folders.get_mut(&id)
    }

    /// Looks up an element.
    #[must_use]
    pub fn element(&self, id: ObjectId) -> Option<&Element> {
        self.elements.get(&id)
    }

    /// Looks up an element mutably.
    pub fn element_mut(&mut self, id: ObjectId) -> Option<&mut Element> {
        self.elements.get_mut(&id)
    }

    /// Looks up a relationship.
    #[must_use]
    pub fn relationship(&self, id: ObjectId) -> Option<&Relationship> {
        self.relationships.get(&id)
    }

    /// Looks up a relationship mutably.
    pub fn relationship_mut(&mut self, id: ObjectId) -> Option<&mut Relationship> {
        self.relationships.get_mut(&id)
    }

    /// Looks up a view.
    #[must_use]
    pub fn view(&self, id: ObjectId) -> Option<&View> {
        self.views.get(&id)
    }

    /// Looks up a view mutably.
    pub fn view_mut(&mut self, id: ObjectId) -> Option<&mut View> {
        self.views.get_mut(&id)
    }

    /// Looks up a view node.
    #[must_use]
    pub fn view_node(&self, id: ObjectId) -> Option<&ViewNode> {
        self.view_nodes.get(&id)
    }

    /// Looks up a view node mutably.
    pub fn view_node_mut(&mut self, id: ObjectId) -> Option<&mut ViewNode> {
        self.view_nodes.get_mut(&id)
    }

    /// Looks up a view connection.
    #[must_use]
    pub fn view_connection(&self, id: ObjectId) -> Option<&ViewConnection> {
        self.view_connections.get(&id)
    }

    /// Looks up an image.
    #[must_use]
    pub fn image(&self, id: ObjectId) -> Option<&ImageRef> {
        self.images.get(&id)
    }

    // ------------------------------------------------------------------
    // Generic access
    // ------------------------------------------------------------------

    /// All identifiers of one kind, in identifier order.
    #[must_use]
    pub fn ids_of(&self, kind: ObjectKind) -> Vec<ObjectId> {
        match kind {
            ObjectKind::Profile => self.profiles.keys().copied().collect(),
            ObjectKind::Folder => self.folders.keys().copied().collect(),
            ObjectKind::Element => self.elements.keys().copied().collect(),
            ObjectKind::Relationship => self.relationships.keys().copied().collect(),
            ObjectKind::View => self.views.keys().copied().collect(),
            ObjectKind::ViewNode => self.view_nodes.keys().copied().collect(),
            ObjectKind::ViewConnection => self.view_connections.keys().copied().collect(),
            ObjectKind::Image => self.images.keys().copied().collect(),
        }
    }

    /// Number of objects of one kind.
    #[must_use]
    pub fn count_of(&self, kind: ObjectKind) -> usize {
        match kind {
            ObjectKind::Profile => self.profiles.len(),
            ObjectKind::Folder => self.folders.len(),
            ObjectKind::Element => self.elements.len(),
            ObjectKind::Relationship => self.relationships.len(),
            ObjectKind::View => self.views.len(),
            ObjectKind::ViewNode => self.view_nodes.len(),
            ObjectKind::ViewConnection => self.view_connections.len(),
            ObjectKind::Image => self.images.len(),
        }
    }

    /// Returns true if an object with this identifier exists in any
    /// collection.
    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.kind_of(id).is_some()
    }

    /// Finds which collection holds this identifier.
    #[must_use]
    pub fn kind_of(&self, id: ObjectId) -> Option<ObjectKind> {
        ObjectKind::ALL
            .into_iter()
            .find(|kind| self.has(*kind, id))
    }

    fn has(&self, kind: ObjectKind, id: ObjectId) -> bool {
        match kind {
            ObjectKind::Profile => self.profiles.contains_key(&id),
            ObjectKind::Folder => self.folders.contains_key(&id),
            ObjectKind::Element => self.elements.contains_key(&id),
            ObjectKind::Relationship => self.relationships.contains_key(&id),
            ObjectKind::View => self.views.contains_key(&id),
            ObjectKind::ViewNode => self.view_nodes.contains_key(&id),
            ObjectKind::ViewConnection => self.view_connections.contains_key(&id),
            ObjectKind::Image => self.images.contains_key(&id),
        }
    }

    /// Versioning metadata of one object.
    #[must_use]
    pub fn object_metadata(&self, kind: ObjectKind, id: ObjectId) -> Option<&VersionedMetadata> {
        match kind {
            ObjectKind::Profile => self.profiles.get(&id).map(Profile::metadata),
            ObjectKind::Folder => self.folders.get(&id).map(Folder::metadata),
            ObjectKind::Element => self.elements.get(&id).map(Element::metadata),
            ObjectKind::Relationship => self.relationships.get(&id).map(Relationship::metadata),
            ObjectKind::View => self.views.get(&id).map(View::metadata),
            ObjectKind::ViewNode => self.view_nodes.get(&id).map(ViewNode::metadata),
            ObjectKind::ViewConnection => {
                self.view_connections.get(&id).map(ViewConnection::metadata)
            }
            ObjectKind::Image => self.images.get(&id).map(ImageRef::metadata),
        }
    }

    /// Mutable versioning metadata of one object.
    pub fn object_metadata_mut(
        &mut self,
        kind: ObjectKind,
        id: ObjectId,
    ) -> Option<&mut VersionedMetadata> {
        match kind {
            ObjectKind::Profile => self.profiles.get_mut(&id).map(Profile::metadata_mut),
            ObjectKind::Folder => self.folders.get_mut(&id).map(Folder::metadata_mut),
            ObjectKind::Element => self.elements.get_mut(&id).map(Element::metadata_mut),
            ObjectKind::Relationship => self
                .relationships
                .get_mut(&id)
                .map(Relationship::metadata_mut),
            ObjectKind::View => self.views.get_mut(&id).map(View::metadata_mut),
            ObjectKind::ViewNode => self.view_nodes.get_mut(&id).map(ViewNode::metadata_mut),
            ObjectKind::ViewConnection => self
                .view_connections
                .get_mut(&id)
                .map(ViewConnection::metadata_mut),
            ObjectKind::Image => self.images.get_mut(&id).map(ImageRef::metadata_mut),
        }
    }

    /// Structural checksum of one object.
    #[must_use]
    pub fn checksum_of(&self, kind: ObjectKind, id: ObjectId) -> Option<String> {
        match kind {
            ObjectKind::Profile => self.profiles.get(&id).map(Checksummed::checksum),
            ObjectKind::Folder => self.folders.get(&id).map(Checksummed::checksum),
            ObjectKind::Element => self.elements.get(&id).map(Checksummed::checksum),
            ObjectKind::Relationship => self.relationships.get(&id).map(Checksummed::checksum),
            ObjectKind::View => self.views.get(&id).map(Checksummed::checksum),
            ObjectKind::ViewNode => self.view_nodes.get(&id).map(Checksummed::checksum),
            ObjectKind::ViewConnection => self.view_connections.get(&id).map(Checksummed::checksum),
            ObjectKind::Image => self.images.get(&id).map(Checksummed::checksum),
        }
    }

    /// Clones one object into its variant wrapper.
    #[must_use]
    pub fn any_object(&self, kind: ObjectKind, id: ObjectId) -> Option<AnyObject> {
        match kind {
            ObjectKind::Profile => self.profiles.get(&id).cloned().map(AnyObject::Profile),
            ObjectKind::Folder => self.folders.get(&id).cloned().map(AnyObject::Folder),
            ObjectKind::Element => self.elements.get(&id).cloned().map(AnyObject::Element),
            ObjectKind::Relationship => self
                .relationships
                .get(&id)
                .cloned()
                .map(AnyObject::Relationship),
            ObjectKind::View => self.views.get(&id).cloned().map(AnyObject::View),
            ObjectKind::ViewNode => self.view_nodes.get(&id).cloned().map(AnyObject::ViewNode),
            ObjectKind::ViewConnection => self
                .view_connections
                .get(&id)
                .cloned()
                .map(AnyObject::ViewConnection),
            ObjectKind::Image => self.images.get(&id).cloned().map(AnyObject::Image),
        }
    }

    // ------------------------------------------------------------------
    // Structural mutation
    // ------------------------------------------------------------------

    /// Inserts an object into its collection and attaches it to `parent`.
    ///
    /// Profiles and images are model-level and take no parent. Folders with
    /// no parent become root folders. Elements, relationships and views
    /// require a folder parent; view nodes attach to their view or to a
    /// parent view node; view connections attach to their view.
    pub fn insert_object(
        &mut self,
        object: AnyObject,
        parent: Option<ObjectId>,
    ) -> ModelResult<ObjectId> {
        let id = object.id();
        let kind = object.kind();
        if self.contains(id) {
            return Err(ModelError::duplicate(kind, id));
        }

        match object {
            AnyObject::Profile(profile) => {
                self.profiles.insert(id, profile);
            }
            AnyObject::Image(image) => {
                self.images.insert(id, image);
            }
            AnyObject::Folder(folder) => {
                self.folders.insert(id, folder);
                match parent {
                    Some(parent_id) => self.attach_to_folder(parent_id, id)?,
                    None => self.root_folders.push(id),
                }
            }
            AnyObject::Element(element) => {
                self.elements.insert(id, element);
                self.attach_required(kind, id, parent)?;
            }
            AnyObject::Relationship(relationship) => {
                self.relationships.insert(id, relationship);
                self.attach_required(kind, id, parent)?;
            }
            AnyObject::View(view) => {
                self.views.insert(id, view);
                self.attach_required(kind, id, parent)?;
            }
            AnyObject::ViewNode(node) => {
                let parent_id = parent.ok_or_else(|| {
                    ModelError::invalid_edit("view node requires a parent")
                })?;
                self.view_nodes.insert(id, node);
                if let Some(view) = self.views.get_mut(&parent_id) {
                    view.nodes.push(id);
                } else if let Some(parent_node) = self.view_nodes.get_mut(&parent_id) {
                    parent_node.children.push(id);
                } else {
                    self.view_nodes.remove(&id);
                    return Err(ModelError::not_found(ObjectKind::View, parent_id));
                }
            }
            AnyObject::ViewConnection(connection) => {
                let parent_id = parent.ok_or_else(|| {
                    ModelError::invalid_edit("view connection requires a parent view")
                })?;
                let Some(view) = self.views.get_mut(&parent_id) else {
                    return Err(ModelError::not_found(ObjectKind::View, parent_id));
                };
                view.connections.push(id);
                self.view_connections.insert(id, connection);
            }
        }
        Ok(id)
    }

    fn attach_required(
        &mut self,
        kind: ObjectKind,
        id: ObjectId,
        parent: Option<ObjectId>,
    ) -> ModelResult<()> {
        let Some(parent_id) = parent else {
            return Err(ModelError::invalid_edit(format!(
                "{} requires a folder parent",
                kind.label()
            )));
        };
        self.attach_to_folder(parent_id, id)
    }

    fn attach_to_folder(&mut self, folder_id: ObjectId, child: ObjectId) -> ModelResult<()> {
        let Some(folder) = self.folders.get_mut(&folder_id) else {
            return Err(ModelError::not_found(ObjectKind::Folder, folder_id));
        };
        folder.children.push(child);
        Ok(())
    }

    /// Removes an object from its collection and detaches it from whatever
    /// list contained it.
    ///
    /// Returns the removed object together with its former parent and rank,
    /// so a reversible edit can restore it exactly.
    pub fn remove_object(
        &mut self,
        kind: ObjectKind,
        id: ObjectId,
    ) -> ModelResult<(AnyObject, Option<ObjectId>, usize)> {
        let (parent, rank) = self.detach(id);
        let object = match kind {
            ObjectKind::Profile => self.profiles.remove(&id).map(AnyObject::Profile),
            ObjectKind::Folder => self.folders.remove(&id).map(AnyObject::Folder),
            ObjectKind::Element => self.elements.remove(&id).map(AnyObject::Element),
            ObjectKind::Relationship => {
                self.relationships.remove(&id).map(AnyObject::Relationship)
            }
            ObjectKind::View => self.views.remove(&id).map(AnyObject::View),
            ObjectKind::ViewNode => self.view_nodes.remove(&id).map(AnyObject::ViewNode),
            ObjectKind::ViewConnection => self
                .view_connections
                .remove(&id)
                .map(AnyObject::ViewConnection),
            ObjectKind::Image => self.images.remove(&id).map(AnyObject::Image),
        };
        match object {
            Some(object) => Ok((object, parent, rank)),
            None => Err(ModelError::not_found(kind, id)),
        }
    }

    /// Restores an object at an exact parent position (the inverse of
    /// [`Model::remove_object`]).
    pub fn restore_object(
        &mut self,
        object: AnyObject,
        parent: Option<ObjectId>,
        rank: usize,
    ) -> ModelResult<()> {
        let id = self.insert_object(object, parent)?;
        // insert_object appends; move the entry back to its former rank.
        self.shift_to_rank(id, rank);
        Ok(())
    }

    /// Finds the parent list holding `id` and the rank within it.
    #[must_use]
    pub fn locate_parent(&self, id: ObjectId) -> Option<(ObjectId, usize)> {
        for (folder_id, folder) in &self.folders {
            if let Some(rank) = folder.children.iter().position(|c| *c == id) {
                return Some((*folder_id, rank));
            }
        }
        for (view_id, view) in &self.views {
            if let Some(rank) = view.nodes.iter().position(|c| *c == id) {
                return Some((*view_id, rank));
            }
            if let Some(rank) = view.connections.iter().position(|c| *c == id) {
                return Some((*view_id, rank));
            }
        }
        for (node_id, node) in &self.view_nodes {
            if let Some(rank) = node.children.iter().position(|c| *c == id) {
                return Some((*node_id, rank));
            }
        }
        None
    }

    /// Detaches `id` from root folders or any parent list.
    ///
    /// Returns the former parent and rank (rank within root folders when the
    /// parent is `None`).
    fn detach(&mut self, id: ObjectId) -> (Option<ObjectId>, usize) {
        if let Some(rank) = self.root_folders.iter().position(|f| *f == id) {
            self.root_folders.remove(rank);
            return (None, rank);
        }
        if let Some((parent, rank)) = self.locate_parent(id) {
            if let Some(folder) = self.folders.get_mut(&parent) {
                folder.children.retain(|c| *c != id);
            }
            if let Some(view) = self.views.get_mut(&parent) {
                view.nodes.retain(|c| *c != id);
                view.connections.retain(|c| *c != id);
            }
            if let Some(node) = self.view_nodes.get_mut(&parent) {
                node.children.retain(|c| *c != id);
            }
            return (Some(parent), rank);
        }
        (None, 0)
    }

    pub(crate) fn shift_to_rank(&mut self, id: ObjectId, rank: usize) {
        let move_in = |list: &mut Vec<ObjectId>| {
            if let Some(position) = list.iter().position(|c| *c == id) {
                let entry = list.remove(position);
                let target = rank.min(list.len());
                list.insert(target, entry);
                true
            } else {
                false
            }
        };
        if move_in(&mut self.root_folders) {
            return;
        }
        for folder in self.folders.values_mut() {
            if move_in(&mut folder.children) {
                return;
            }
        }
        for view in self.views.values_mut() {
            if move_in(&mut view.nodes) || move_in(&mut view.connections) {
                return;
            }
        }
        for node in self.view_nodes.values_mut() {
            if move_in(&mut node.children) {
                return;
            }
        }
    }

    /// Moves an object to a different folder, appending it to the target's
    /// children. Used for folder-move reconciliation during export.
    pub fn rehome(&mut self, id: ObjectId, target_folder: ObjectId) -> ModelResult<()> {
        if !self.folders.contains_key(&target_folder) {
            return Err(ModelError::not_found(ObjectKind::Folder, target_folder));
        }
        self.detach(id);
        self.attach_to_folder(target_folder, id)
    }

    // ------------------------------------------------------------------
    // Checksums
    // ------------------------------------------------------------------

    /// Recomputes `current.checksum` for every object and the model itself.
    ///
    /// Views additionally get their container checksum (own content plus
    /// every descendant's content in rank order) so unchanged subtrees can
    /// be skipped with one string compare.
    pub fn refresh_checksums(&mut self, timestamp: u64) {
        for kind in ObjectKind::ALL {
            for id in self.ids_of(kind) {
                let checksum = self
                    .checksum_of(kind, id)
                    .unwrap_or_default();
                let container = if kind == ObjectKind::View {
                    Some(self.view_container_checksum(id))
                } else {
                    None
                };
                if let Some(metadata) = self.object_metadata_mut(kind, id) {
                    metadata.current.checksum = checksum;
                    metadata.current.container_checksum = container;
                    metadata.current.timestamp = timestamp;
                }
            }
        }
        self.metadata.current.checksum = self.checksum();
        self.metadata.current.timestamp = timestamp;
    }

    /// Combined checksum of a view and its whole subtree.
    #[must_use]
    pub fn view_container_checksum(&self, view_id: ObjectId) -> String {
        let mut builder = ChecksumBuilder::new();
        if let Some(view) = self.views.get(&view_id) {
            builder.child(&view.checksum());
            for node_id in &view.nodes {
                self.write_node_subtree(&mut builder, *node_id);
            }
            for connection_id in &view.connections {
                if let Some(connection) = self.view_connections.get(connection_id) {
                    builder.child(&connection.checksum());
                }
            }
        }
        builder.finish()
    }

    fn write_node_subtree(&self, builder: &mut ChecksumBuilder, node_id: ObjectId) {
        if let Some(node) = self.view_nodes.get(&node_id) {
            builder.child(&node.checksum());
            for child in &node.children {
                self.write_node_subtree(builder, *child);
            }
        }
    }

    // ------------------------------------------------------------------
    // Registries
    // ------------------------------------------------------------------

    /// The deferred endpoint-reference registry.
    pub fn pending_refs(&mut self) -> &mut PendingRefs {
        &mut self.pending_refs
    }

    /// Records (or overwrites) the conflict choice for one object.
    pub fn set_conflict_choice(&mut self, id: ObjectId, choice: ConflictChoice) {
        self.conflicts.insert(id, choice);
    }

    /// The recorded conflict choice for one object, if any.
    #[must_use]
    pub fn conflict_choice(&self, id: ObjectId) -> Option<ConflictChoice> {
        self.conflicts.get(&id).copied()
    }

    /// All recorded conflict choices.
    #[must_use]
    pub fn conflicts(&self) -> &BTreeMap<ObjectId, ConflictChoice> {
        &self.conflicts
    }

    /// Removes the conflict entry for one object.
    pub fn clear_conflict(&mut self, id: ObjectId) {
        self.conflicts.remove(&id);
    }

    /// Drops all conflict entries.
    pub fn clear_conflicts(&mut self) {
        self.conflicts.clear();
    }

    /// Records a store-only object discovered by comparison.
    pub fn set_absent(&mut self, kind: ObjectKind, id: ObjectId, metadata: VersionedMetadata) {
        self.absent.insert(id, metadata);
        self.absent_kinds.insert(id, kind);
    }

    /// All store-only records of one kind.
    #[must_use]
    pub fn absent_of(&self, kind: ObjectKind) -> Vec<(ObjectId, &VersionedMetadata)> {
        self.absent
            .iter()
            .filter(|(id, _)| self.absent_kinds.get(*id) == Some(&kind))
            .map(|(id, metadata)| (*id, metadata))
            .collect()
    }

    /// Drops all store-only records (the comparison pass rebuilds them).
    pub fn clear_absent(&mut self) {
        self.absent.clear();
        self.absent_kinds.clear();
    }

    /// Flags the model as no longer mirroring any committed state.
    ///
    /// Set when reverting in-memory edits after a failed export itself
    /// fails; the export pipeline refuses to run until the model is
    /// reloaded.
    pub fn mark_inconsistent(&mut self) {
        self.inconsistent = true;
    }

    /// Returns true if the model can be synchronized.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        !self.inconsistent
    }
}

impl Checksummed for Model {
    fn write_content(&self, builder: &mut ChecksumBuilder) {
        builder
            .field("kind", "model")
            .field("name", &self.name)
            .field("purpose", &self.purpose);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Bounds, FolderKind};

    fn model_with_folder() -> (Model, ObjectId) {
        let mut model = Model::new("test");
        let folder = Folder::new("Business", FolderKind::Business);
        let folder_id = model
            .insert_object(AnyObject::Folder(folder), None)
            .unwrap();
        (model, folder_id)
    }

    #[test]
    fn insert_and_lookup() {
        let (mut model, folder_id) = model_with_folder();
        let element = Element::new("BusinessActor", "Customer");
        let element_id = model
            .insert_object(AnyObject::Element(element), Some(folder_id))
            .unwrap();

        assert!(model.contains(element_id));
        assert_eq!(model.kind_of(element_id), Some(ObjectKind::Element));
        assert_eq!(model.folder(folder_id).unwrap().children, vec![element_id]);
    }

    #[test]
    fn duplicate_insert_rejected() {
        let (mut model, folder_id) = model_with_folder();
        let element = Element::new("BusinessActor", "Customer");
        let copy = element.clone();
        model
            .insert_object(AnyObject::Element(element), Some(folder_id))
            .unwrap();
        let result = model.insert_object(AnyObject::Element(copy), Some(folder_id));
        assert!(matches!(result, Err(ModelError::Duplicate { .. })));
    }

    #[test]
    fn element_requires_folder_parent() {
        let mut model = Model::new("test");
        let element = Element::new("BusinessActor", "Customer");
        let result = model.insert_object(AnyObject::Element(element), None);
        assert!(result.is_err());
    }

    #[test]
    fn remove_returns_parent_and_rank() {
        let (mut model, folder_id) = model_with_folder();
        let first = model
            .insert_object(
                AnyObject::Element(Element::new("Node", "a")),
                Some(folder_id),
            )
            .unwrap();
        let second = model
            .insert_object(
                AnyObject::Element(Element::new("Node", "b")),
                Some(folder_id),
            )
            .unwrap();

        let (object, parent, rank) = model.remove_object(ObjectKind::Element, second).unwrap();
        assert_eq!(object.id(), second);
        assert_eq!(parent, Some(folder_id));
        assert_eq!(rank, 1);
        assert_eq!(model.folder(folder_id).unwrap().children, vec![first]);
    }

    #[test]
    fn restore_reinserts_at_rank() {
        let (mut model, folder_id) = model_with_folder();
        let first = model
            .insert_object(
                AnyObject::Element(Element::new("Node", "a")),
                Some(folder_id),
            )
            .unwrap();
        let second = model
            .insert_object(
                AnyObject::Element(Element::new("Node", "b")),
                Some(folder_id),
            )
            .unwrap();

        let (object, parent, rank) = model.remove_object(ObjectKind::Element, first).unwrap();
        model.restore_object(object, parent, rank).unwrap();
        assert_eq!(
            model.folder(folder_id).unwrap().children,
            vec![first, second]
        );
    }

    #[test]
    fn rehome_moves_between_folders() {
        let (mut model, source_folder) = model_with_folder();
        let target_folder = model
            .insert_object(
                AnyObject::Folder(Folder::new("Application", FolderKind::Application)),
                None,
            )
            .unwrap();
        let element_id = model
            .insert_object(
                AnyObject::Element(Element::new("Node", "a")),
                Some(source_folder),
            )
            .unwrap();

        model.rehome(element_id, target_folder).unwrap();
        assert!(model.folder(source_folder).unwrap().children.is_empty());
        assert_eq!(
            model.folder(target_folder).unwrap().children,
            vec![element_id]
        );
    }

    #[test]
    fn view_subtree_insertion() {
        let (mut model, folder_id) = model_with_folder();
        let view_id = model
            .insert_object(AnyObject::View(View::new("Overview")), Some(folder_id))
            .unwrap();
        let element_id = model
            .insert_object(
                AnyObject::Element(Element::new("Node", "host")),
                Some(folder_id),
            )
            .unwrap();

        let node = ViewNode::for_element(view_id, element_id, Bounds::default());
        let node_id = model
            .insert_object(AnyObject::ViewNode(node), Some(view_id))
            .unwrap();

        let nested = ViewNode::note(view_id, "note", Bounds::default());
        let nested_id = model
            .insert_object(AnyObject::ViewNode(nested), Some(node_id))
            .unwrap();

        assert_eq!(model.view(view_id).unwrap().nodes, vec![node_id]);
        assert_eq!(model.view_node(node_id).unwrap().children, vec![nested_id]);
    }

    #[test]
    fn refresh_checksums_fills_current() {
        let (mut model, folder_id) = model_with_folder();
        let element_id = model
            .insert_object(
                AnyObject::Element(Element::new("Node", "host")),
                Some(folder_id),
            )
            .unwrap();

        model.refresh_checksums(1000);
        let metadata = model
            .object_metadata(ObjectKind::Element, element_id)
            .unwrap();
        assert!(!metadata.current.checksum.is_empty());
        assert_eq!(metadata.current.timestamp, 1000);
        assert!(!model.metadata.current.checksum.is_empty());
    }

    #[test]
    fn container_checksum_tracks_subtree() {
        let (mut model, folder_id) = model_with_folder();
        let view_id = model
            .insert_object(AnyObject::View(View::new("Overview")), Some(folder_id))
            .unwrap();
        let before = model.view_container_checksum(view_id);

        let node = ViewNode::note(view_id, "note", Bounds::default());
        let node_id = model
            .insert_object(AnyObject::ViewNode(node), Some(view_id))
            .unwrap();
        let with_node = model.view_container_checksum(view_id);
        assert_ne!(before, with_node);

        // The view's own checksum does not cover subtree content.
        let own_before = model.checksum_of(ObjectKind::View, view_id).unwrap();
        if let Some(node) = model.view_nodes.get_mut(&node_id) {
            node.content = Some("edited".into());
        }
        let own_after = model.checksum_of(ObjectKind::View, view_id).unwrap();
        assert_eq!(own_before, own_after);
        assert_ne!(with_node, model.view_container_checksum(view_id));
    }

    #[test]
    fn conflict_registry() {
        let mut model = Model::new("test");
        let id = ObjectId::new();
        model.set_conflict_choice(id, ConflictChoice::AskUser);
        assert_eq!(model.conflict_choice(id), Some(ConflictChoice::AskUser));
        assert!(!model.conflict_choice(id).unwrap().is_resolved());

        model.set_conflict_choice(id, ConflictChoice::ExportToDatabase);
        assert!(model.conflict_choice(id).unwrap().is_resolved());

        model.clear_conflict(id);
        assert!(model.conflict_choice(id).is_none());
    }

    #[test]
    fn absent_registry_is_per_kind() {
        let mut model = Model::new("test");
        let element_id = ObjectId::new();
        let view_id = ObjectId::new();
        model.set_absent(
            ObjectKind::Element,
            element_id,
            VersionedMetadata::created_in_model(),
        );
        model.set_absent(
            ObjectKind::View,
            view_id,
            VersionedMetadata::created_in_model(),
        );

        assert_eq!(model.absent_of(ObjectKind::Element).len(), 1);
        assert_eq!(model.absent_of(ObjectKind::View).len(), 1);
        assert_eq!(model.absent_of(ObjectKind::Folder).len(), 0);

        model.clear_absent();
        assert!(model.absent_of(ObjectKind::Element).is_empty());
    }

    #[test]
    fn inconsistency_flag() {
        let mut model = Model::new("test");
        assert!(model.is_consistent());
        model.mark_inconsistent();
        assert!(!model.is_consistent());
    }
}
