//! Canned model graphs and store seeding helpers.
//!
//! Provides a graph that touches every object kind, and a row-level
//! seeder that writes a model generation straight into a store without
//! going through the synchronization engine.

use modelrepo_model::{
    now_millis, AnyObject, Bounds, Element, Feature, Folder, FolderKind, ImageRef, Model, ObjectId,
    ObjectKind, Profile, Property, Relationship, View, ViewConnection, ViewNode,
};
use modelrepo_store::{deconstruct, ContentRow, MemoryStore, ModelRow, ModelStore};

/// A model graph with one object of every kind, plus handles to each.
pub struct SampleModel {
    /// The graph itself.
    pub model: Model,
    /// Root folder holding business content.
    pub business_folder: ObjectId,
    /// Root folder holding diagrams.
    pub diagrams_folder: ObjectId,
    /// A business actor element.
    pub actor: ObjectId,
    /// A business service element.
    pub service: ObjectId,
    /// The assignment relationship between actor and service.
    pub assignment: ObjectId,
    /// The single view.
    pub view: ObjectId,
    /// View node depicting the actor.
    pub actor_node: ObjectId,
    /// View node depicting the service.
    pub service_node: ObjectId,
    /// Connection depicting the assignment.
    pub connection: ObjectId,
    /// A profile applying to business actors.
    pub profile: ObjectId,
    /// An attached image.
    pub image: ObjectId,
}

impl SampleModel {
    /// Builds the sample graph.
    pub fn build() -> Self {
        let mut model = Model::new("Sample");
        model.purpose = "Fixture covering every object kind".into();

        let business_folder = model
            .insert_object(
                AnyObject::Folder(Folder::new("Business", FolderKind::Business)),
                None,
            )
            .expect("insert business folder");
        let diagrams_folder = model
            .insert_object(
                AnyObject::Folder(Folder::new("Views", FolderKind::Diagrams)),
                None,
            )
            .expect("insert diagrams folder");

        let mut actor_element = Element::new("BusinessActor", "Customer");
        actor_element
            .properties
            .push(Property::new("segment", "retail"));
        actor_element
            .features
            .push(Feature::new("reviewed", "true"));
        let actor = model
            .insert_object(AnyObject::Element(actor_element), Some(business_folder))
            .expect("insert actor");
        let service = model
            .insert_object(
                AnyObject::Element(Element::new("BusinessService", "Ordering")),
                Some(business_folder),
            )
            .expect("insert service");
        let assignment = model
            .insert_object(
                AnyObject::Relationship(Relationship::new(
                    "AssignmentRelationship",
                    "",
                    actor,
                    service,
                )),
                Some(business_folder),
            )
            .expect("insert assignment");

        let view = model
            .insert_object(
                AnyObject::View(View::new("Overview")),
                Some(diagrams_folder),
            )
            .expect("insert view");
        let actor_node = model
            .insert_object(
                AnyObject::ViewNode(ViewNode::for_element(
                    view,
                    actor,
                    Bounds {
                        x: 10,
                        y: 10,
                        width: 120,
                        height: 60,
                    },
                )),
                Some(view),
            )
            .expect("insert actor node");
        let service_node = model
            .insert_object(
                AnyObject::ViewNode(ViewNode::for_element(
                    view,
                    service,
                    Bounds {
                        x: 220,
                        y: 10,
                        width: 120,
                        height: 60,
                    },
                )),
                Some(view),
            )
            .expect("insert service node");
        let connection = model
            .insert_object(
                AnyObject::ViewConnection(ViewConnection::for_relationship(
                    view,
                    assignment,
                    actor_node,
                    service_node,
                )),
                Some(view),
            )
            .expect("insert connection");

        let profile = model
            .insert_object(
                AnyObject::Profile(Profile::new("Criticality", "BusinessActor")),
                None,
            )
            .expect("insert profile");
        let image = model
            .insert_object(
                AnyObject::Image(ImageRef::new("images/logo.png", vec![0x89, 0x50, 0x4e, 0x47])),
                None,
            )
            .expect("insert image");

        Self {
            model,
            business_folder,
            diagrams_folder,
            actor,
            service,
            assignment,
            view,
            actor_node,
            service_node,
            connection,
            profile,
            image,
        }
    }
}

/// Builds a minimal model: one folder with one element.
pub fn minimal_model() -> (Model, ObjectId, ObjectId) {
    let mut model = Model::new("Minimal");
    let folder = model
        .insert_object(
            AnyObject::Folder(Folder::new("Business", FolderKind::Business)),
            None,
        )
        .expect("insert folder");
    let element = model
        .insert_object(
            AnyObject::Element(Element::new("BusinessActor", "Actor")),
            Some(folder),
        )
        .expect("insert element");
    (model, folder, element)
}

/// Creates a fresh in-memory store.
pub fn memory_store() -> MemoryStore {
    MemoryStore::new()
}

/// Writes one generation of `model` into `store` row by row, bypassing
/// the synchronization engine, and promotes the model's baselines to
/// match. Every in-model object is written as a new version.
///
/// Returns the generation number written.
///
/// # Panics
///
/// Panics on any store failure; this is a test helper.
pub fn seed_generation(model: &mut Model, store: &mut dyn ModelStore, user: &str) -> u32 {
    let timestamp = now_millis();
    model.refresh_checksums(timestamp);
    let generation = store
        .latest_model_version(model.id())
        .expect("read latest generation")
        .unwrap_or(0)
        + 1;

    store.begin().expect("begin transaction");
    model.metadata.current.version = generation;
    store
        .insert_model(ModelRow {
            id: model.id(),
            version: generation,
            name: model.name.clone(),
            purpose: model.purpose.clone(),
            checksum: model.metadata.current.checksum.clone(),
            created_by: user.to_string(),
            created_at: timestamp,
        })
        .expect("insert model row");

    for (kind, id, parent, rank) in containment_entries(model) {
        let version = {
            let metadata = model
                .object_metadata_mut(kind, id)
                .expect("object metadata");
            metadata.current.version = metadata.latest_database.version + 1;
            metadata.current.timestamp = timestamp;
            metadata.current.version
        };
        let object = model.any_object(kind, id).expect("object present");
        let parts = deconstruct(&object, user, timestamp);
        store.insert_object(parts.row).expect("insert object row");
        store
            .insert_properties(parts.properties)
            .expect("insert properties");
        store.insert_features(parts.features).expect("insert features");
        store
            .insert_bendpoints(parts.bendpoints)
            .expect("insert bendpoints");
        store
            .insert_content(ContentRow {
                model: model.id(),
                model_version: generation,
                kind,
                object: id,
                object_version: version,
                parent,
                rank,
            })
            .expect("insert content row");
    }
    store.commit().expect("commit");

    model.metadata.promote_current();
    for kind in ObjectKind::ALL {
        for id in model.ids_of(kind) {
            if let Some(metadata) = model.object_metadata_mut(kind, id) {
                metadata.promote_current();
            }
        }
    }
    generation
}

/// Flattens the model's containment into `(kind, object, parent, rank)`
/// entries, parents before children.
pub fn containment_entries(model: &Model) -> Vec<(ObjectKind, ObjectId, Option<ObjectId>, u32)> {
    let mut entries = Vec::new();
    for (rank, id) in model.ids_of(ObjectKind::Profile).into_iter().enumerate() {
        entries.push((ObjectKind::Profile, id, None, rank as u32));
    }
    for (rank, root) in model.root_folders().iter().enumerate() {
        entries.push((ObjectKind::Folder, *root, None, rank as u32));
    }
    for root in model.root_folders().to_vec() {
        walk_folder(model, root, &mut entries);
    }
    for (rank, id) in model.ids_of(ObjectKind::Image).into_iter().enumerate() {
        entries.push((ObjectKind::Image, id, None, rank as u32));
    }
    entries
}

fn walk_folder(
    model: &Model,
    folder_id: ObjectId,
    entries: &mut Vec<(ObjectKind, ObjectId, Option<ObjectId>, u32)>,
) {
    let Some(folder) = model.folder(folder_id) else {
        return;
    };
    for (rank, child) in folder.children.iter().enumerate() {
        let Some(kind) = model.kind_of(*child) else {
            continue;
        };
        entries.push((kind, *child, Some(folder_id), rank as u32));
        match kind {
            ObjectKind::Folder => walk_folder(model, *child, entries),
            ObjectKind::View => walk_view(model, *child, entries),
            _ => {}
        }
    }
}

fn walk_view(
    model: &Model,
    view_id: ObjectId,
    entries: &mut Vec<(ObjectKind, ObjectId, Option<ObjectId>, u32)>,
) {
    let Some(view) = model.view(view_id) else {
        return;
    };
    for (rank, node) in view.nodes.iter().enumerate() {
        entries.push((ObjectKind::ViewNode, *node, Some(view_id), rank as u32));
        walk_node(model, *node, entries);
    }
    for (rank, connection) in view.connections.iter().enumerate() {
        entries.push((
            ObjectKind::ViewConnection,
            *connection,
            Some(view_id),
            rank as u32,
        ));
    }
}

fn walk_node(
    model: &Model,
    node_id: ObjectId,
    entries: &mut Vec<(ObjectKind, ObjectId, Option<ObjectId>, u32)>,
) {
    let Some(node) = model.view_node(node_id) else {
        return;
    };
    for (rank, child) in node.children.iter().enumerate() {
        entries.push((ObjectKind::ViewNode, *child, Some(node_id), rank as u32));
        walk_node(model, *child, entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelrepo_model::SyncStatus;

    #[test]
    fn sample_model_covers_every_kind() {
        let sample = SampleModel::build();
        for kind in ObjectKind::ALL {
            assert!(
                !sample.model.ids_of(kind).is_empty(),
                "no {} in sample",
                kind.label()
            );
        }
    }

    #[test]
    fn seeded_model_reports_synced() {
        let mut sample = SampleModel::build();
        let mut store = memory_store();
        let generation = seed_generation(&mut sample.model, &mut store, "seeder");
        assert_eq!(generation, 1);
        assert_eq!(
            store.latest_model_version(sample.model.id()).unwrap(),
            Some(1)
        );

        let metadata = sample
            .model
            .object_metadata(ObjectKind::Element, sample.actor)
            .unwrap();
        assert_eq!(metadata.sync_status(), SyncStatus::Synced);
    }

    #[test]
    fn containment_entries_order_parents_first() {
        let sample = SampleModel::build();
        let entries = containment_entries(&sample.model);
        let position = |id: ObjectId| entries.iter().position(|(_, e, _, _)| *e == id).unwrap();
        assert!(position(sample.view) < position(sample.actor_node));
        assert!(position(sample.business_folder) < position(sample.actor));
        assert_eq!(entries.len(), 11);
    }
}
