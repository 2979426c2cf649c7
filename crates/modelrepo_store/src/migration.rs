//! Sequential schema upgrades.
//!
//! The stored schema version gates every connection: below the oldest
//! supported version or above the expected version the store is refused.
//! In between, upgrade steps run in order inside one transaction; a step
//! failure rolls back the whole upgrade and leaves the stored version
//! unchanged.

use tracing::{debug, info};

use modelrepo_model::{AnyObject, ObjectKind};

use crate::dialect::{ColumnType, Dialect};
use crate::error::{StoreError, StoreResult};
use crate::rows::{materialize, ContentRow};
use crate::schema::object_table;
use crate::store::ModelStore;

/// Oldest stored schema version this code can migrate from.
pub const OLDEST_SUPPORTED_SCHEMA_VERSION: u32 = 1;

/// Schema version this code reads and writes.
pub const EXPECTED_SCHEMA_VERSION: u32 = 3;

/// One upgrade step from schema version N to N + 1.
pub trait UpgradeStep: Send + Sync {
    /// The schema version this step upgrades from.
    fn from_version(&self) -> u32;

    /// Human-readable step name.
    fn name(&self) -> &str;

    /// DDL statements to run, rendered for the dialect.
    fn statements(&self, dialect: Dialect) -> Vec<String>;

    /// Data backfill run after the DDL, inside the same transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the backfill fails; the upgrade rolls back.
    fn backfill(&self, _store: &mut dyn ModelStore) -> StoreResult<()> {
        Ok(())
    }
}

/// Schema 1 to 2: views gain a subtree checksum column.
struct AddContainerChecksum;

impl UpgradeStep for AddContainerChecksum {
    fn from_version(&self) -> u32 {
        1
    }

    fn name(&self) -> &str {
        "add_view_container_checksum"
    }

    fn statements(&self, dialect: Dialect) -> Vec<String> {
        vec![dialect.add_column(
            &object_table(ObjectKind::View),
            "container_checksum",
            ColumnType::Text,
        )]
    }
}

/// Schema 2 to 3: content checksums changed shape, so every stored row's
/// checksum column is recomputed from its own rows.
struct RecomputeChecksums;

impl UpgradeStep for RecomputeChecksums {
    fn from_version(&self) -> u32 {
        2
    }

    fn name(&self) -> &str {
        "recompute_content_checksums"
    }

    fn statements(&self, _dialect: Dialect) -> Vec<String> {
        Vec::new()
    }

    fn backfill(&self, store: &mut dyn ModelStore) -> StoreResult<()> {
        for kind in ObjectKind::ALL {
            for (id, version) in store.all_object_keys(kind)? {
                let row = store.object_at(kind, id, version)?.ok_or_else(|| {
                    StoreError::row_not_found(format!("{} {id} v{version}", kind.label()))
                })?;
                let properties = store.properties_of(id, version)?;
                let features = store.features_of(id, version)?;
                let bendpoints = store.bendpoints_of(id, version)?;
                let mut object = materialize(&row, &properties, &features, &bendpoints)?;
                attach_containment(store, &mut object, version)?;
                let checksum = object.content_checksum();
                store.update_checksum(kind, id, version, checksum, row.container_checksum)?;
            }
        }
        Ok(())
    }
}

/// Containment lists live in junction rows, not in the object row, so a
/// materialized container starts empty. Its content checksum covers the
/// ordered child identifiers, so the lists are rebuilt from any generation
/// referencing this version before hashing.
fn attach_containment(
    store: &dyn ModelStore,
    object: &mut AnyObject,
    version: u32,
) -> StoreResult<()> {
    if !matches!(
        object,
        AnyObject::Folder(_) | AnyObject::View(_) | AnyObject::ViewNode(_)
    ) {
        return Ok(());
    }
    let id = object.id();
    let Some((model, generation)) = store.generation_containing(id, version)? else {
        return Ok(());
    };
    let mut rows: Vec<ContentRow> = Vec::new();
    for kind in ObjectKind::ALL {
        let count = store.content_count(model, generation, kind)?;
        rows.extend(
            store
                .contents_of(model, generation, kind, 0, count)?
                .into_iter()
                .filter(|row| row.parent == Some(id)),
        );
    }
    match object {
        AnyObject::Folder(folder) => {
            // Folder children share one rank sequence across kinds.
            rows.sort_by_key(|row| row.rank);
            folder.children = rows.iter().map(|row| row.object).collect();
        }
        AnyObject::View(view) => {
            view.nodes = rows
                .iter()
                .filter(|row| row.kind == ObjectKind::ViewNode)
                .map(|row| row.object)
                .collect();
            view.connections = rows
                .iter()
                .filter(|row| row.kind == ObjectKind::ViewConnection)
                .map(|row| row.object)
                .collect();
        }
        AnyObject::ViewNode(node) => {
            node.children = rows.iter().map(|row| row.object).collect();
        }
        _ => {}
    }
    Ok(())
}

/// Runs the registered upgrade steps against a store.
pub struct SchemaUpgrader {
    dialect: Dialect,
    steps: Vec<Box<dyn UpgradeStep>>,
}

impl SchemaUpgrader {
    /// Creates an upgrader with the built-in step chain.
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self::with_steps(
            dialect,
            vec![Box::new(AddContainerChecksum), Box::new(RecomputeChecksums)],
        )
    }

    /// Creates an upgrader with a custom step chain.
    #[must_use]
    pub fn with_steps(dialect: Dialect, steps: Vec<Box<dyn UpgradeStep>>) -> Self {
        Self { dialect, steps }
    }

    /// Checks a stored schema version against the supported range.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownSchemaVersion`] outside
    /// `OLDEST_SUPPORTED_SCHEMA_VERSION..=EXPECTED_SCHEMA_VERSION`.
    pub fn check_version(found: u32) -> StoreResult<()> {
        if found < OLDEST_SUPPORTED_SCHEMA_VERSION || found > EXPECTED_SCHEMA_VERSION {
            return Err(StoreError::UnknownSchemaVersion {
                found,
                oldest: OLDEST_SUPPORTED_SCHEMA_VERSION,
                expected: EXPECTED_SCHEMA_VERSION,
            });
        }
        Ok(())
    }

    /// Brings the store up to [`EXPECTED_SCHEMA_VERSION`].
    ///
    /// Runs every applicable step in order inside one transaction and
    /// returns the final schema version. A store already at the expected
    /// version is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownSchemaVersion`] for versions outside
    /// the supported range and [`StoreError::MigrationFailed`] if a step
    /// fails; in that case the whole upgrade has been rolled back.
    pub fn upgrade(&self, store: &mut dyn ModelStore) -> StoreResult<u32> {
        let found = store.schema_version()?;
        Self::check_version(found)?;
        if found == EXPECTED_SCHEMA_VERSION {
            return Ok(found);
        }

        info!(from = found, to = EXPECTED_SCHEMA_VERSION, "upgrading schema");
        store.begin()?;
        match self.run_steps(store, found) {
            Ok(version) => {
                store.commit()?;
                Ok(version)
            }
            Err(error) => {
                store.rollback()?;
                Err(StoreError::migration_failed(error.to_string()))
            }
        }
    }

    fn run_steps(&self, store: &mut dyn ModelStore, found: u32) -> StoreResult<u32> {
        let mut version = found;
        while version < EXPECTED_SCHEMA_VERSION {
            let step = self
                .steps
                .iter()
                .find(|step| step.from_version() == version)
                .ok_or_else(|| {
                    StoreError::migration_failed(format!("no upgrade step from version {version}"))
                })?;
            debug!(step = step.name(), from = version, "applying upgrade step");
            for statement in step.statements(self.dialect) {
                debug!(%statement, "schema statement");
            }
            step.backfill(store)?;
            version += 1;
            store.set_schema_version(version)?;
        }
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::rows::{ObjectPayload, ObjectRow};
    use modelrepo_model::{Checksummed, ObjectId, View};

    struct FailingStep;

    impl UpgradeStep for FailingStep {
        fn from_version(&self) -> u32 {
            1
        }

        fn name(&self) -> &str {
            "failing"
        }

        fn statements(&self, _dialect: Dialect) -> Vec<String> {
            Vec::new()
        }

        fn backfill(&self, _store: &mut dyn ModelStore) -> StoreResult<()> {
            Err(StoreError::integrity("intentional failure"))
        }
    }

    #[test]
    fn versions_outside_the_range_are_refused() {
        assert!(matches!(
            SchemaUpgrader::check_version(0),
            Err(StoreError::UnknownSchemaVersion { .. })
        ));
        assert!(matches!(
            SchemaUpgrader::check_version(EXPECTED_SCHEMA_VERSION + 1),
            Err(StoreError::UnknownSchemaVersion { .. })
        ));
        assert!(SchemaUpgrader::check_version(OLDEST_SUPPORTED_SCHEMA_VERSION).is_ok());
    }

    #[test]
    fn current_store_is_left_untouched() {
        let mut store = MemoryStore::new();
        let upgrader = SchemaUpgrader::new(Dialect::Sqlite);
        assert_eq!(
            upgrader.upgrade(&mut store).unwrap(),
            EXPECTED_SCHEMA_VERSION
        );
        assert!(!store.in_transaction());
    }

    #[test]
    fn old_store_is_upgraded_to_the_expected_version() {
        let mut store = MemoryStore::at_schema_version(1);
        let upgrader = SchemaUpgrader::new(Dialect::Postgres);
        assert_eq!(
            upgrader.upgrade(&mut store).unwrap(),
            EXPECTED_SCHEMA_VERSION
        );
        assert_eq!(store.schema_version().unwrap(), EXPECTED_SCHEMA_VERSION);
    }

    #[test]
    fn failed_step_rolls_back_the_whole_upgrade() {
        let mut store = MemoryStore::at_schema_version(1);
        let upgrader = SchemaUpgrader::with_steps(Dialect::Sqlite, vec![Box::new(FailingStep)]);
        let result = upgrader.upgrade(&mut store);
        assert!(matches!(result, Err(StoreError::MigrationFailed { .. })));
        assert_eq!(store.schema_version().unwrap(), 1);
        assert!(!store.in_transaction());
    }

    #[test]
    fn checksum_backfill_rewrites_stale_checksums() {
        let mut store = MemoryStore::at_schema_version(2);
        let id = ObjectId::new();
        store.begin().unwrap();
        store
            .insert_object(ObjectRow {
                id,
                version: 1,
                checksum: "stale".into(),
                container_checksum: None,
                created_by: "alice".into(),
                created_at: 0,
                payload: ObjectPayload::Profile {
                    name: "Specialization".into(),
                    applies_to: "element".into(),
                    image_path: None,
                },
            })
            .unwrap();
        store.commit().unwrap();

        let upgrader = SchemaUpgrader::new(Dialect::Sqlite);
        upgrader.upgrade(&mut store).unwrap();

        let row = store
            .object_at(ObjectKind::Profile, id, 1)
            .unwrap()
            .unwrap();
        assert_ne!(row.checksum, "stale");
        let rebuilt = materialize(&row, &[], &[], &[]).unwrap();
        assert_eq!(row.checksum, rebuilt.content_checksum());
    }

    #[test]
    fn checksum_backfill_rebuilds_container_children() {
        let mut store = MemoryStore::at_schema_version(2);
        let model = ObjectId::new();
        let view_id = ObjectId::new();
        let first = ObjectId::new();
        let second = ObjectId::new();

        store.begin().unwrap();
        store
            .insert_object(ObjectRow {
                id: view_id,
                version: 1,
                checksum: "stale".into(),
                container_checksum: None,
                created_by: "alice".into(),
                created_at: 0,
                payload: ObjectPayload::View {
                    name: "Overview".into(),
                    documentation: String::new(),
                    viewpoint: None,
                    background: None,
                    connection_router: None,
                },
            })
            .unwrap();
        store
            .insert_content(ContentRow {
                model,
                model_version: 1,
                kind: ObjectKind::View,
                object: view_id,
                object_version: 1,
                parent: None,
                rank: 0,
            })
            .unwrap();
        for (rank, id) in [first, second].into_iter().enumerate() {
            store
                .insert_object(ObjectRow {
                    id,
                    version: 1,
                    checksum: "stale".into(),
                    container_checksum: None,
                    created_by: "alice".into(),
                    created_at: 0,
                    payload: ObjectPayload::ViewNode {
                        view: view_id,
                        element: None,
                        x: 0,
                        y: 0,
                        width: 0,
                        height: 0,
                        fill_color: None,
                        content: None,
                    },
                })
                .unwrap();
            store
                .insert_content(ContentRow {
                    model,
                    model_version: 1,
                    kind: ObjectKind::ViewNode,
                    object: id,
                    object_version: 1,
                    parent: Some(view_id),
                    rank: rank as u32,
                })
                .unwrap();
        }
        store.commit().unwrap();

        let upgrader = SchemaUpgrader::new(Dialect::Sqlite);
        upgrader.upgrade(&mut store).unwrap();

        // The recomputed view checksum covers its nodes in junction rank
        // order, not an empty list.
        let mut expected = View::new("Overview");
        expected.nodes = vec![first, second];
        let row = store.object_at(ObjectKind::View, view_id, 1).unwrap().unwrap();
        assert_eq!(row.checksum, expected.checksum());
    }
}
