//! The conflict resolution protocol.
//!
//! Comparison tags every conflicting object with [`ConflictChoice::AskUser`]
//! unless a choice was already recorded. The presentation layer reads the
//! pending queue, asks the user, and records terminal choices here; once the
//! last conflict is resolved the export pipeline can be re-entered.

use modelrepo_model::{ConflictChoice, Model, ObjectId};

use crate::error::{SyncError, SyncResult};

/// Identifiers still awaiting a user choice, in identifier order.
#[must_use]
pub fn pending_conflicts(model: &Model) -> Vec<ObjectId> {
    model
        .conflicts()
        .iter()
        .filter(|(_, choice)| !choice.is_resolved())
        .map(|(id, _)| *id)
        .collect()
}

/// Number of conflicts still awaiting a user choice.
#[must_use]
pub fn unresolved_count(model: &Model) -> usize {
    model
        .conflicts()
        .values()
        .filter(|choice| !choice.is_resolved())
        .count()
}

/// Records a terminal choice for one conflicting object.
///
/// # Errors
///
/// Rejects [`ConflictChoice::AskUser`] (not a resolution) and identifiers
/// with no recorded conflict.
pub fn resolve(model: &mut Model, id: ObjectId, choice: ConflictChoice) -> SyncResult<()> {
    if !choice.is_resolved() {
        return Err(SyncError::integrity("ask-user is not a resolution"));
    }
    if model.conflict_choice(id).is_none() {
        return Err(SyncError::integrity(format!("{id} is not conflicting")));
    }
    model.set_conflict_choice(id, choice);
    Ok(())
}

/// Applies one choice to every pending conflict (the "remember my choice"
/// flag).
///
/// # Errors
///
/// Rejects [`ConflictChoice::AskUser`].
pub fn resolve_all(model: &mut Model, choice: ConflictChoice) -> SyncResult<usize> {
    if !choice.is_resolved() {
        return Err(SyncError::integrity("ask-user is not a resolution"));
    }
    let pending = pending_conflicts(model);
    let count = pending.len();
    for id in pending {
        model.set_conflict_choice(id, choice);
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolving_clears_the_pending_queue() {
        let mut model = Model::new("m");
        let a = ObjectId::new();
        let b = ObjectId::new();
        model.set_conflict_choice(a, ConflictChoice::AskUser);
        model.set_conflict_choice(b, ConflictChoice::AskUser);
        assert_eq!(unresolved_count(&model), 2);

        resolve(&mut model, a, ConflictChoice::ExportToDatabase).unwrap();
        assert_eq!(pending_conflicts(&model), vec![b]);

        resolve(&mut model, b, ConflictChoice::ImportFromDatabase).unwrap();
        assert_eq!(unresolved_count(&model), 0);
    }

    #[test]
    fn ask_user_is_not_a_resolution() {
        let mut model = Model::new("m");
        let id = ObjectId::new();
        model.set_conflict_choice(id, ConflictChoice::AskUser);
        assert!(resolve(&mut model, id, ConflictChoice::AskUser).is_err());
    }

    #[test]
    fn resolve_all_applies_one_choice_everywhere() {
        let mut model = Model::new("m");
        for _ in 0..3 {
            model.set_conflict_choice(ObjectId::new(), ConflictChoice::AskUser);
        }
        let count = resolve_all(&mut model, ConflictChoice::DoNotExport).unwrap();
        assert_eq!(count, 3);
        assert_eq!(unresolved_count(&model), 0);
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        let mut model = Model::new("m");
        let result = resolve(&mut model, ObjectId::new(), ConflictChoice::ExportToDatabase);
        assert!(result.is_err());
    }
}
