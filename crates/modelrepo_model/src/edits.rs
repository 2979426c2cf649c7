//! Reversible model edits.
//!
//! The export pipeline mirrors remote deletions and remote updates into the
//! in-memory graph before writing. Those mutations must be undoable as one
//! unit when the database transaction rolls back, so they are expressed as
//! an explicit command list instead of ad hoc flags: each [`ModelEdit`]
//! knows how to apply itself and how to revert itself, and a
//! [`CompoundEdit`] reverts everything it applied in reverse order.

use crate::error::{ModelError, ModelResult};
use crate::id::ObjectId;
use crate::model::{AnyObject, Model};
use crate::node::ObjectKind;

/// One reversible mutation of the in-memory graph.
#[derive(Debug)]
pub enum ModelEdit {
    /// Remove an object (mirroring a remote deletion).
    Remove {
        /// Kind of the object to remove.
        kind: ObjectKind,
        /// Identifier of the object to remove.
        id: ObjectId,
        /// Snapshot captured at apply time, consumed by revert.
        undo: Option<(AnyObject, Option<ObjectId>, usize)>,
    },
    /// Insert an object (mirroring remote-only content).
    Insert {
        /// The object to insert; taken at apply time, restored by revert.
        object: Option<AnyObject>,
        /// Identifier of the inserted object.
        id: ObjectId,
        /// Kind of the inserted object.
        kind: ObjectKind,
        /// Parent to attach to.
        parent: Option<ObjectId>,
    },
    /// Replace an object's content in place (same identifier).
    Replace {
        /// Kind of the object.
        kind: ObjectKind,
        /// Identifier of the object.
        id: ObjectId,
        /// New content before apply; previous content after apply.
        object: Option<AnyObject>,
    },
    /// Move an object to a different folder.
    Rehome {
        /// Identifier of the object to move.
        id: ObjectId,
        /// Target folder.
        to: ObjectId,
        /// Former parent and rank, captured at apply time.
        undo: Option<(Option<ObjectId>, usize)>,
    },
}

impl ModelEdit {
    /// Creates a remove edit.
    #[must_use]
    pub fn remove(kind: ObjectKind, id: ObjectId) -> Self {
        Self::Remove {
            kind,
            id,
            undo: None,
        }
    }

    /// Creates an insert edit.
    #[must_use]
    pub fn insert(object: AnyObject, parent: Option<ObjectId>) -> Self {
        let id = object.id();
        let kind = object.kind();
        Self::Insert {
            object: Some(object),
            id,
            kind,
            parent,
        }
    }

    /// Creates a replace edit.
    #[must_use]
    pub fn replace(object: AnyObject) -> Self {
        let id = object.id();
        let kind = object.kind();
        Self::Replace {
            kind,
            id,
            object: Some(object),
        }
    }

    /// Creates a rehome edit.
    #[must_use]
    pub fn rehome(id: ObjectId, to: ObjectId) -> Self {
        Self::Rehome { id, to, undo: None }
    }

    fn apply(&mut self, model: &mut Model) -> ModelResult<()> {
        match self {
            ModelEdit::Remove { kind, id, undo } => {
                let removed = model.remove_object(*kind, *id)?;
                *undo = Some(removed);
                Ok(())
            }
            ModelEdit::Insert {
                object, id, parent, ..
            } => {
                let object = object
                    .take()
                    .ok_or_else(|| ModelError::invalid_edit(format!("insert of {id} re-applied")))?;
                model.insert_object(object, *parent)?;
                Ok(())
            }
            ModelEdit::Replace { kind, id, object } => {
                let new = object
                    .take()
                    .ok_or_else(|| ModelError::invalid_edit(format!("replace of {id} re-applied")))?;
                let (previous, parent, rank) = model.remove_object(*kind, *id)?;
                model.restore_object(new, parent, rank)?;
                *object = Some(previous);
                Ok(())
            }
            ModelEdit::Rehome { id, to, undo } => {
                let former = model
                    .locate_parent(*id)
                    .map(|(parent, rank)| (Some(parent), rank));
                model.rehome(*id, *to)?;
                *undo = former.or(Some((None, 0)));
                Ok(())
            }
        }
    }

    fn revert(&mut self, model: &mut Model) -> ModelResult<()> {
        match self {
            ModelEdit::Remove { id, undo, .. } => {
                let (object, parent, rank) = undo
                    .take()
                    .ok_or_else(|| ModelError::invalid_edit(format!("remove of {id} not applied")))?;
                model.restore_object(object, parent, rank)
            }
            ModelEdit::Insert {
                object, id, kind, ..
            } => {
                let (removed, _, _) = model.remove_object(*kind, *id)?;
                *object = Some(removed);
                Ok(())
            }
            ModelEdit::Replace { kind, id, object } => {
                let previous = object
                    .take()
                    .ok_or_else(|| ModelError::invalid_edit(format!("replace of {id} not applied")))?;
                let (new, parent, rank) = model.remove_object(*kind, *id)?;
                model.restore_object(previous, parent, rank)?;
                *object = Some(new);
                Ok(())
            }
            ModelEdit::Rehome { id, undo, .. } => {
                let (parent, rank) = undo
                    .take()
                    .ok_or_else(|| ModelError::invalid_edit(format!("rehome of {id} not applied")))?;
                match parent {
                    Some(folder) => {
                        model.rehome(*id, folder)?;
                        model.shift_to_rank(*id, rank);
                    }
                    None => {
                        // Was a root folder before; rehome cannot go back to
                        // the root set, so restore via remove + restore.
                        if let Some(kind) = model.kind_of(*id) {
                            let (object, _, _) = model.remove_object(kind, *id)?;
                            model.restore_object(object, None, rank)?;
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

/// An ordered list of applied edits, reverted as one unit.
#[derive(Debug, Default)]
pub struct CompoundEdit {
    applied: Vec<ModelEdit>,
}

impl CompoundEdit {
    /// Creates an empty compound edit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an edit and records it for later reversion.
    ///
    /// An edit that fails to apply is not recorded.
    pub fn apply(&mut self, model: &mut Model, mut edit: ModelEdit) -> ModelResult<()> {
        edit.apply(model)?;
        self.applied.push(edit);
        Ok(())
    }

    /// Reverts every applied edit, last first.
    ///
    /// If any single reversion fails the model is flagged inconsistent and
    /// the error is returned; remaining edits are not attempted (the graph
    /// no longer matches what they recorded).
    pub fn revert(mut self, model: &mut Model) -> ModelResult<()> {
        while let Some(mut edit) = self.applied.pop() {
            if let Err(error) = edit.revert(model) {
                model.mark_inconsistent();
                return Err(ModelError::inconsistent(format!(
                    "failed to revert edit: {error}"
                )));
            }
        }
        Ok(())
    }

    /// Number of applied edits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.applied.len()
    }

    /// Returns true if nothing was applied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Element, Folder, FolderKind};

    fn fixture() -> (Model, ObjectId, ObjectId) {
        let mut model = Model::new("test");
        let folder_id = model
            .insert_object(
                AnyObject::Folder(Folder::new("Business", FolderKind::Business)),
                None,
            )
            .unwrap();
        let element_id = model
            .insert_object(
                AnyObject::Element(Element::new("Node", "host")),
                Some(folder_id),
            )
            .unwrap();
        (model, folder_id, element_id)
    }

    #[test]
    fn remove_then_revert_restores_graph() {
        let (mut model, folder_id, element_id) = fixture();
        let mut compound = CompoundEdit::new();
        compound
            .apply(&mut model, ModelEdit::remove(ObjectKind::Element, element_id))
            .unwrap();
        assert!(!model.contains(element_id));

        compound.revert(&mut model).unwrap();
        assert!(model.contains(element_id));
        assert_eq!(model.folder(folder_id).unwrap().children, vec![element_id]);
    }

    #[test]
    fn insert_then_revert_removes() {
        let (mut model, folder_id, _) = fixture();
        let incoming = Element::new("Node", "remote");
        let incoming_id = incoming.id;

        let mut compound = CompoundEdit::new();
        compound
            .apply(
                &mut model,
                ModelEdit::insert(AnyObject::Element(incoming), Some(folder_id)),
            )
            .unwrap();
        assert!(model.contains(incoming_id));

        compound.revert(&mut model).unwrap();
        assert!(!model.contains(incoming_id));
    }

    #[test]
    fn replace_then_revert_restores_content() {
        let (mut model, _, element_id) = fixture();
        let mut replacement = model.element(element_id).unwrap().clone();
        replacement.name = "remote name".into();

        let mut compound = CompoundEdit::new();
        compound
            .apply(&mut model, ModelEdit::replace(AnyObject::Element(replacement)))
            .unwrap();
        assert_eq!(model.element(element_id).unwrap().name, "remote name");

        compound.revert(&mut model).unwrap();
        assert_eq!(model.element(element_id).unwrap().name, "host");
    }

    #[test]
    fn compound_reverts_in_reverse_order() {
        let (mut model, folder_id, element_id) = fixture();
        let incoming = Element::new("Node", "remote");
        let incoming_id = incoming.id;

        let mut compound = CompoundEdit::new();
        compound
            .apply(&mut model, ModelEdit::remove(ObjectKind::Element, element_id))
            .unwrap();
        compound
            .apply(
                &mut model,
                ModelEdit::insert(AnyObject::Element(incoming), Some(folder_id)),
            )
            .unwrap();
        assert_eq!(compound.len(), 2);

        compound.revert(&mut model).unwrap();
        assert!(model.contains(element_id));
        assert!(!model.contains(incoming_id));
        assert_eq!(model.folder(folder_id).unwrap().children, vec![element_id]);
    }

    #[test]
    fn rehome_then_revert() {
        let (mut model, source_folder, element_id) = fixture();
        let target_folder = model
            .insert_object(
                AnyObject::Folder(Folder::new("Application", FolderKind::Application)),
                None,
            )
            .unwrap();

        let mut compound = CompoundEdit::new();
        compound
            .apply(&mut model, ModelEdit::rehome(element_id, target_folder))
            .unwrap();
        assert_eq!(
            model.folder(target_folder).unwrap().children,
            vec![element_id]
        );

        compound.revert(&mut model).unwrap();
        assert_eq!(
            model.folder(source_folder).unwrap().children,
            vec![element_id]
        );
        assert!(model.folder(target_folder).unwrap().children.is_empty());
    }

    #[test]
    fn failed_revert_marks_model_inconsistent() {
        let (mut model, _, element_id) = fixture();
        let mut compound = CompoundEdit::new();
        compound
            .apply(&mut model, ModelEdit::remove(ObjectKind::Element, element_id))
            .unwrap();

        // Re-insert the same identifier out-of-band; the revert now hits a
        // duplicate and must flag the model.
        let clone = Element {
            id: element_id,
            ..Element::new("Node", "ghost")
        };
        let folder = model.root_folders()[0];
        model
            .insert_object(AnyObject::Element(clone), Some(folder))
            .unwrap();

        let result = compound.revert(&mut model);
        assert!(matches!(result, Err(ModelError::Inconsistent { .. })));
        assert!(!model.is_consistent());
    }
}
