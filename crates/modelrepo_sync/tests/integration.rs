//! End-to-end scenarios: two clients sharing one store, export and import
//! round trips, conflict resolution, and schema migration interplay.

use modelrepo_model::{
    AnyObject, Checksummed, ConflictChoice, Element, Model, ObjectKind, Relationship, SyncStatus,
};
use modelrepo_store::{
    deconstruct, ContentRow, Dialect, MemoryStore, ModelRow, ModelStore, SchemaUpgrader,
    EXPECTED_SCHEMA_VERSION,
};
use modelrepo_sync::{
    compare, export, import_model, pending_conflicts, resolve, ExportOutcome, NullProgress,
    SyncError,
};
use modelrepo_testkit::prelude::*;

fn exported_sample() -> (SampleModel, MemoryStore) {
    let mut sample = SampleModel::build();
    let mut store = memory_store();
    let outcome = export(&mut sample.model, &mut store, "alice", &mut NullProgress).unwrap();
    assert_eq!(outcome, ExportOutcome::Exported { generation: 1 });
    (sample, store)
}

#[test]
fn export_then_import_reproduces_the_graph() {
    let (sample, store) = exported_sample();
    let mut imported = import_model(&store, sample.model.id(), None, &mut NullProgress).unwrap();

    assert_eq!(imported.name, sample.model.name);
    assert_eq!(imported.purpose, sample.model.purpose);
    for kind in ObjectKind::ALL {
        assert_eq!(
            imported.ids_of(kind).len(),
            sample.model.ids_of(kind).len(),
            "{} count differs",
            kind.label()
        );
    }
    assert_eq!(
        imported.folder(sample.business_folder).unwrap().children,
        sample.model.folder(sample.business_folder).unwrap().children
    );
    assert_eq!(
        imported.view(sample.view).unwrap().nodes,
        sample.model.view(sample.view).unwrap().nodes
    );
    assert_eq!(
        imported.view(sample.view).unwrap().connections,
        sample.model.view(sample.view).unwrap().connections
    );
    assert_eq!(
        imported.element(sample.actor).unwrap().checksum(),
        sample.model.element(sample.actor).unwrap().checksum()
    );

    // A freshly imported model compares clean.
    let report = compare(&mut imported, &store, &mut NullProgress).unwrap();
    assert!(!report.has_changes());
    assert_eq!(report.model_status, SyncStatus::Synced);
}

#[test]
fn second_client_edit_is_absorbed_without_a_new_generation() {
    let (mut sample, mut store) = exported_sample();
    let mut other = import_model(&store, sample.model.id(), None, &mut NullProgress).unwrap();
    other.element_mut(sample.actor).unwrap().name = "Customer (renamed)".into();
    let outcome = export(&mut other, &mut store, "bob", &mut NullProgress).unwrap();
    assert_eq!(outcome, ExportOutcome::Exported { generation: 2 });

    // The first client took no local action; exporting pulls the remote
    // edit in and writes nothing.
    let outcome = export(&mut sample.model, &mut store, "alice", &mut NullProgress).unwrap();
    assert_eq!(outcome, ExportOutcome::NothingToExport);
    assert_eq!(
        sample.model.element(sample.actor).unwrap().name,
        "Customer (renamed)"
    );
    assert_eq!(store.latest_model_version(sample.model.id()).unwrap(), Some(2));

    let report = compare(&mut sample.model, &store, &mut NullProgress).unwrap();
    assert!(!report.has_changes());
}

#[test]
fn concurrent_edits_conflict_and_suspend_the_export() {
    let (mut sample, mut store) = exported_sample();
    let mut other = import_model(&store, sample.model.id(), None, &mut NullProgress).unwrap();
    other.element_mut(sample.actor).unwrap().name = "Theirs".into();
    export(&mut other, &mut store, "bob", &mut NullProgress).unwrap();

    sample.model.element_mut(sample.actor).unwrap().name = "Ours".into();
    let outcome = export(&mut sample.model, &mut store, "alice", &mut NullProgress).unwrap();
    assert_eq!(outcome, ExportOutcome::Suspended { conflicts: 1 });
    assert_eq!(pending_conflicts(&sample.model), vec![sample.actor]);
}

#[test]
fn export_resolution_writes_the_local_version() {
    let (mut sample, mut store) = exported_sample();
    let mut other = import_model(&store, sample.model.id(), None, &mut NullProgress).unwrap();
    other.element_mut(sample.actor).unwrap().name = "Theirs".into();
    export(&mut other, &mut store, "bob", &mut NullProgress).unwrap();

    sample.model.element_mut(sample.actor).unwrap().name = "Ours".into();
    export(&mut sample.model, &mut store, "alice", &mut NullProgress).unwrap();
    resolve(&mut sample.model, sample.actor, ConflictChoice::ExportToDatabase).unwrap();

    let outcome = export(&mut sample.model, &mut store, "alice", &mut NullProgress).unwrap();
    assert_eq!(outcome, ExportOutcome::Exported { generation: 3 });

    let stamp = store
        .latest_stamp(ObjectKind::Element, sample.actor)
        .unwrap()
        .unwrap();
    assert_eq!(stamp.version, 3);
    let reread = import_model(&store, sample.model.id(), None, &mut NullProgress).unwrap();
    assert_eq!(reread.element(sample.actor).unwrap().name, "Ours");
}

#[test]
fn import_resolution_adopts_the_remote_version() {
    let (mut sample, mut store) = exported_sample();
    let mut other = import_model(&store, sample.model.id(), None, &mut NullProgress).unwrap();
    other.element_mut(sample.actor).unwrap().name = "Theirs".into();
    export(&mut other, &mut store, "bob", &mut NullProgress).unwrap();

    sample.model.element_mut(sample.actor).unwrap().name = "Ours".into();
    export(&mut sample.model, &mut store, "alice", &mut NullProgress).unwrap();
    resolve(
        &mut sample.model,
        sample.actor,
        ConflictChoice::ImportFromDatabase,
    )
    .unwrap();

    let outcome = export(&mut sample.model, &mut store, "alice", &mut NullProgress).unwrap();
    assert_eq!(outcome, ExportOutcome::NothingToExport);
    assert_eq!(sample.model.element(sample.actor).unwrap().name, "Theirs");
    assert_eq!(store.latest_model_version(sample.model.id()).unwrap(), Some(2));
}

#[test]
fn do_not_export_holds_the_local_edit_back() {
    let (mut sample, mut store) = exported_sample();
    let mut other = import_model(&store, sample.model.id(), None, &mut NullProgress).unwrap();
    other.element_mut(sample.actor).unwrap().name = "Theirs".into();
    export(&mut other, &mut store, "bob", &mut NullProgress).unwrap();

    sample.model.element_mut(sample.actor).unwrap().name = "Ours".into();
    export(&mut sample.model, &mut store, "alice", &mut NullProgress).unwrap();
    resolve(&mut sample.model, sample.actor, ConflictChoice::DoNotExport).unwrap();

    let outcome = export(&mut sample.model, &mut store, "alice", &mut NullProgress).unwrap();
    assert_eq!(outcome, ExportOutcome::Exported { generation: 3 });

    // The local edit stays in memory; the new generation references the
    // remote version.
    assert_eq!(sample.model.element(sample.actor).unwrap().name, "Ours");
    let entry = store
        .content_entry(sample.model.id(), 3, sample.actor)
        .unwrap()
        .unwrap();
    assert_eq!(entry.object_version, 2);
    let stamp = store
        .latest_stamp(ObjectKind::Element, sample.actor)
        .unwrap()
        .unwrap();
    assert_eq!(stamp.version, 2);
}

#[test]
fn remote_deletion_removes_the_object_locally() {
    let (mut sample, mut store) = exported_sample();
    let mut other = import_model(&store, sample.model.id(), None, &mut NullProgress).unwrap();
    // The connection depicting the assignment has to go first.
    other
        .remove_object(ObjectKind::ViewConnection, sample.connection)
        .unwrap();
    other
        .remove_object(ObjectKind::Relationship, sample.assignment)
        .unwrap();
    export(&mut other, &mut store, "bob", &mut NullProgress).unwrap();

    let report = compare(&mut sample.model, &store, &mut NullProgress).unwrap();
    assert_eq!(report.totals.deleted_in_database, 2);

    let outcome = export(&mut sample.model, &mut store, "alice", &mut NullProgress).unwrap();
    assert_eq!(outcome, ExportOutcome::NothingToExport);
    assert!(!sample.model.contains(sample.assignment));
    assert!(!sample.model.contains(sample.connection));
}

#[test]
fn remote_addition_appears_locally() {
    let (mut sample, mut store) = exported_sample();
    let mut other = import_model(&store, sample.model.id(), None, &mut NullProgress).unwrap();
    let added = other
        .insert_object(
            AnyObject::Element(Element::new("BusinessRole", "Clerk")),
            Some(sample.business_folder),
        )
        .unwrap();
    export(&mut other, &mut store, "bob", &mut NullProgress).unwrap();

    let report = compare(&mut sample.model, &store, &mut NullProgress).unwrap();
    assert_eq!(report.totals.new_in_database, 1);

    let outcome = export(&mut sample.model, &mut store, "alice", &mut NullProgress).unwrap();
    assert_eq!(outcome, ExportOutcome::NothingToExport);
    assert!(sample.model.contains(added));
    assert_eq!(
        sample
            .model
            .folder(sample.business_folder)
            .unwrap()
            .children
            .last(),
        Some(&added)
    );
}

#[test]
fn object_versions_grow_by_one_per_export() {
    let (mut sample, mut store) = exported_sample();
    for (round, name) in ["v2", "v3", "v4"].into_iter().enumerate() {
        sample.model.element_mut(sample.actor).unwrap().name = name.into();
        let outcome = export(&mut sample.model, &mut store, "alice", &mut NullProgress).unwrap();
        let generation = round as u32 + 2;
        assert_eq!(outcome, ExportOutcome::Exported { generation });
        let stamp = store
            .latest_stamp(ObjectKind::Element, sample.actor)
            .unwrap()
            .unwrap();
        assert_eq!(stamp.version, generation);
    }
}

#[test]
fn reordered_children_survive_the_round_trip() {
    let (mut sample, mut store) = exported_sample();
    let folder = sample.model.folder_mut(sample.business_folder).unwrap();
    folder.children.reverse();
    let expected = folder.children.clone();

    let outcome = export(&mut sample.model, &mut store, "alice", &mut NullProgress).unwrap();
    assert_eq!(outcome, ExportOutcome::Exported { generation: 2 });

    let imported = import_model(&store, sample.model.id(), None, &mut NullProgress).unwrap();
    assert_eq!(
        imported.folder(sample.business_folder).unwrap().children,
        expected
    );
}

#[test]
fn reordered_view_nodes_survive_the_round_trip() {
    let (mut sample, mut store) = exported_sample();
    let view = sample.model.view_mut(sample.view).unwrap();
    view.nodes.reverse();
    let expected = view.nodes.clone();

    let outcome = export(&mut sample.model, &mut store, "alice", &mut NullProgress).unwrap();
    assert_eq!(outcome, ExportOutcome::Exported { generation: 2 });

    let imported = import_model(&store, sample.model.id(), None, &mut NullProgress).unwrap();
    assert_eq!(imported.view(sample.view).unwrap().nodes, expected);
}

#[test]
fn older_generations_stay_importable() {
    let (mut sample, mut store) = exported_sample();
    let original_name = sample.model.element(sample.actor).unwrap().name.clone();
    sample.model.element_mut(sample.actor).unwrap().name = "Renamed".into();
    export(&mut sample.model, &mut store, "alice", &mut NullProgress).unwrap();

    let old = import_model(&store, sample.model.id(), Some(1), &mut NullProgress).unwrap();
    assert_eq!(old.element(sample.actor).unwrap().name, original_name);
    let new = import_model(&store, sample.model.id(), Some(2), &mut NullProgress).unwrap();
    assert_eq!(new.element(sample.actor).unwrap().name, "Renamed");
}

#[test]
fn failed_commit_reverts_staged_remote_changes() {
    let (mut sample, mut store) = exported_sample();
    let mut other = import_model(&store, sample.model.id(), None, &mut NullProgress).unwrap();
    other.element_mut(sample.actor).unwrap().name = "Theirs".into();
    export(&mut other, &mut store, "bob", &mut NullProgress).unwrap();

    // A local edit elsewhere forces a write alongside the staged remote
    // rename.
    sample.model.element_mut(sample.service).unwrap().name = "Ordering v2".into();
    store.fail_next_commit();
    let result = export(&mut sample.model, &mut store, "alice", &mut NullProgress);
    assert!(result.is_err());
    assert!(!store.in_transaction());
    assert!(sample.model.is_consistent());
    // The staged remote rename was rolled back with everything else.
    assert_eq!(sample.model.element(sample.actor).unwrap().name, "Customer");
    assert_eq!(store.latest_model_version(sample.model.id()).unwrap(), Some(2));

    // The next attempt goes through.
    let outcome = export(&mut sample.model, &mut store, "alice", &mut NullProgress).unwrap();
    assert_eq!(outcome, ExportOutcome::Exported { generation: 3 });
    assert_eq!(sample.model.element(sample.actor).unwrap().name, "Theirs");
}

#[test]
fn dangling_relationship_endpoint_fails_the_import() {
    let mut store = memory_store();
    let (mut model, folder, _) = minimal_model();
    seed_generation(&mut model, &mut store, "seeder");

    // Hand-write a second generation whose relationship points at an
    // element that is in no generation.
    let relationship = Relationship::new(
        "AssignmentRelationship",
        "",
        modelrepo_model::ObjectId::new(),
        modelrepo_model::ObjectId::new(),
    );
    let relationship_id = relationship.id;
    let parts = deconstruct(&AnyObject::Relationship(relationship), "seeder", 7);
    store.begin().unwrap();
    store
        .insert_model(ModelRow {
            id: model.id(),
            version: 2,
            name: model.name.clone(),
            purpose: model.purpose.clone(),
            checksum: model.metadata.current.checksum.clone(),
            created_by: "seeder".into(),
            created_at: 7,
        })
        .unwrap();
    let mut row = parts.row;
    row.version = 1;
    store.insert_object(row).unwrap();
    for (kind, id, parent, rank) in containment_entries(&model) {
        store
            .insert_content(ContentRow {
                model: model.id(),
                model_version: 2,
                kind,
                object: id,
                object_version: 1,
                parent,
                rank,
            })
            .unwrap();
    }
    store
        .insert_content(ContentRow {
            model: model.id(),
            model_version: 2,
            kind: ObjectKind::Relationship,
            object: relationship_id,
            object_version: 1,
            parent: Some(folder),
            rank: 1,
        })
        .unwrap();
    store.commit().unwrap();

    let result = import_model(&store, model.id(), Some(2), &mut NullProgress);
    assert!(matches!(
        result,
        Err(SyncError::UnresolvedReference { waiting, .. }) if waiting == relationship_id
    ));
}

#[test]
fn upgraded_store_synchronizes_normally() {
    let mut store = MemoryStore::at_schema_version(1);
    let upgrader = SchemaUpgrader::new(Dialect::Sqlite);
    upgrader.upgrade(&mut store).unwrap();
    assert_eq!(store.schema_version().unwrap(), EXPECTED_SCHEMA_VERSION);

    let mut sample = SampleModel::build();
    let outcome = export(&mut sample.model, &mut store, "alice", &mut NullProgress).unwrap();
    assert_eq!(outcome, ExportOutcome::Exported { generation: 1 });
    let imported = import_model(&store, sample.model.id(), None, &mut NullProgress).unwrap();
    assert_eq!(imported.ids_of(ObjectKind::Element).len(), 2);
}

#[test]
fn future_schema_version_is_refused() {
    let mut store = MemoryStore::at_schema_version(EXPECTED_SCHEMA_VERSION + 1);
    let upgrader = SchemaUpgrader::new(Dialect::Sqlite);
    assert!(upgrader.upgrade(&mut store).is_err());
}
