//! In-memory store for testing and embedded use.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use modelrepo_model::{ObjectId, ObjectKind};

use crate::error::{StoreError, StoreResult};
use crate::migration::EXPECTED_SCHEMA_VERSION;
use crate::rows::{
    BendpointRow, ContentRow, FeatureRow, ModelRow, ObjectRow, PropertyRow, VersionStamp,
};
use crate::store::ModelStore;

/// One full copy of the store's tables.
#[derive(Debug, Clone, Default)]
struct StoreState {
    schema_version: u32,
    models: BTreeMap<(ObjectId, u32), ModelRow>,
    objects: BTreeMap<(ObjectKind, ObjectId, u32), ObjectRow>,
    contents: Vec<ContentRow>,
    properties: BTreeMap<(ObjectId, u32), Vec<PropertyRow>>,
    features: BTreeMap<(ObjectId, u32), Vec<FeatureRow>>,
    bendpoints: BTreeMap<(ObjectId, u32), Vec<BendpointRow>>,
}

#[derive(Debug, Default)]
struct Inner {
    committed: StoreState,
    open: Option<StoreState>,
    fail_next_commit: bool,
}

/// An in-memory [`ModelStore`].
///
/// Transactions work on a full snapshot of the committed state: `begin`
/// clones it, writes go to the clone, `commit` swaps the clone in and
/// `rollback` drops it. Suitable for unit tests, integration tests, and
/// repositories that do not need persistence.
///
/// # Thread Safety
///
/// Reads are thread-safe; writes go through `&mut self` as the trait
/// requires.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store at the expected schema version.
    #[must_use]
    pub fn new() -> Self {
        let store = Self::default();
        store.inner.write().committed.schema_version = EXPECTED_SCHEMA_VERSION;
        store
    }

    /// Creates an empty store reporting the given schema version.
    ///
    /// Useful for testing schema upgrades.
    #[must_use]
    pub fn at_schema_version(version: u32) -> Self {
        let store = Self::default();
        store.inner.write().committed.schema_version = version;
        store
    }

    /// Makes the next `commit` fail and roll back.
    ///
    /// Useful for testing transactional recovery.
    pub fn fail_next_commit(&mut self) {
        self.inner.write().fail_next_commit = true;
    }

    /// Number of committed object rows across all kinds and versions.
    #[must_use]
    pub fn object_row_count(&self) -> usize {
        self.inner.read().committed.objects.len()
    }

    /// Number of committed containment rows.
    #[must_use]
    pub fn content_row_count(&self) -> usize {
        self.inner.read().committed.contents.len()
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        let inner = self.inner.read();
        f(inner.open.as_ref().unwrap_or(&inner.committed))
    }

    fn in_tx<T>(&mut self, f: impl FnOnce(&mut StoreState) -> StoreResult<T>) -> StoreResult<T> {
        let mut inner = self.inner.write();
        let state = inner
            .open
            .as_mut()
            .ok_or_else(|| StoreError::transaction("write outside a transaction"))?;
        f(state)
    }
}

impl ModelStore for MemoryStore {
    fn begin(&mut self) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if inner.open.is_some() {
            return Err(StoreError::transaction("transaction already open"));
        }
        inner.open = Some(inner.committed.clone());
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let state = inner
            .open
            .take()
            .ok_or_else(|| StoreError::transaction("commit without a transaction"))?;
        if inner.fail_next_commit {
            inner.fail_next_commit = false;
            return Err(StoreError::transaction("injected commit failure"));
        }
        inner.committed = state;
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner
            .open
            .take()
            .ok_or_else(|| StoreError::transaction("rollback without a transaction"))?;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.inner.read().open.is_some()
    }

    fn schema_version(&self) -> StoreResult<u32> {
        Ok(self.read(|state| state.schema_version))
    }

    fn set_schema_version(&mut self, version: u32) -> StoreResult<()> {
        self.in_tx(|state| {
            state.schema_version = version;
            Ok(())
        })
    }

    fn insert_model(&mut self, row: ModelRow) -> StoreResult<()> {
        self.in_tx(|state| {
            let key = (row.id, row.version);
            if state.models.contains_key(&key) {
                return Err(StoreError::DuplicateVersion {
                    id: row.id,
                    version: row.version,
                });
            }
            state.models.insert(key, row);
            Ok(())
        })
    }

    fn model_at(&self, id: ObjectId, version: u32) -> StoreResult<Option<ModelRow>> {
        Ok(self.read(|state| state.models.get(&(id, version)).cloned()))
    }

    fn latest_model_version(&self, id: ObjectId) -> StoreResult<Option<u32>> {
        Ok(self.read(|state| {
            state
                .models
                .range((id, 0)..=(id, u32::MAX))
                .next_back()
                .map(|((_, version), _)| *version)
        }))
    }

    fn insert_object(&mut self, row: ObjectRow) -> StoreResult<()> {
        self.in_tx(|state| {
            let key = (row.kind(), row.id, row.version);
            if state.objects.contains_key(&key) {
                return Err(StoreError::DuplicateVersion {
                    id: row.id,
                    version: row.version,
                });
            }
            state.objects.insert(key, row);
            Ok(())
        })
    }

    fn insert_content(&mut self, row: ContentRow) -> StoreResult<()> {
        self.in_tx(|state| {
            state.contents.push(row);
            Ok(())
        })
    }

    fn insert_properties(&mut self, rows: Vec<PropertyRow>) -> StoreResult<()> {
        self.in_tx(|state| {
            for row in rows {
                state
                    .properties
                    .entry((row.parent, row.parent_version))
                    .or_default()
                    .push(row);
            }
            Ok(())
        })
    }

    fn insert_features(&mut self, rows: Vec<FeatureRow>) -> StoreResult<()> {
        self.in_tx(|state| {
            for row in rows {
                state
                    .features
                    .entry((row.parent, row.parent_version))
                    .or_default()
                    .push(row);
            }
            Ok(())
        })
    }

    fn insert_bendpoints(&mut self, rows: Vec<BendpointRow>) -> StoreResult<()> {
        self.in_tx(|state| {
            for row in rows {
                state
                    .bendpoints
                    .entry((row.parent, row.parent_version))
                    .or_default()
                    .push(row);
            }
            Ok(())
        })
    }

    fn object_at(
        &self,
        kind: ObjectKind,
        id: ObjectId,
        version: u32,
    ) -> StoreResult<Option<ObjectRow>> {
        Ok(self.read(|state| state.objects.get(&(kind, id, version)).cloned()))
    }

    fn latest_stamp(&self, kind: ObjectKind, id: ObjectId) -> StoreResult<Option<VersionStamp>> {
        Ok(self.read(|state| {
            state
                .objects
                .range((kind, id, 0)..=(kind, id, u32::MAX))
                .next_back()
                .map(|(_, row)| row.stamp())
        }))
    }

    fn stamps_in_generation(
        &self,
        model: ObjectId,
        generation: u32,
        kind: ObjectKind,
    ) -> StoreResult<Vec<VersionStamp>> {
        self.read(|state| {
            state
                .contents
                .iter()
                .filter(|row| {
                    row.model == model && row.model_version == generation && row.kind == kind
                })
                .map(|row| {
                    state
                        .objects
                        .get(&(kind, row.object, row.object_version))
                        .map(|object| object.stamp())
                        .ok_or_else(|| {
                            StoreError::integrity(format!(
                                "containment row points at missing {} {} v{}",
                                kind.label(),
                                row.object,
                                row.object_version
                            ))
                        })
                })
                .collect()
        })
    }

    fn stamp_in_generation(
        &self,
        model: ObjectId,
        generation: u32,
        kind: ObjectKind,
        id: ObjectId,
    ) -> StoreResult<Option<VersionStamp>> {
        self.read(|state| {
            let Some(row) = state.contents.iter().find(|row| {
                row.model == model
                    && row.model_version == generation
                    && row.kind == kind
                    && row.object == id
            }) else {
                return Ok(None);
            };
            state
                .objects
                .get(&(kind, row.object, row.object_version))
                .map(|object| Some(object.stamp()))
                .ok_or_else(|| {
                    StoreError::integrity(format!(
                        "containment row points at missing {} {} v{}",
                        kind.label(),
                        row.object,
                        row.object_version
                    ))
                })
        })
    }

    fn contents_of(
        &self,
        model: ObjectId,
        generation: u32,
        kind: ObjectKind,
        offset: usize,
        limit: usize,
    ) -> StoreResult<Vec<ContentRow>> {
        Ok(self.read(|state| {
            let mut rows: Vec<ContentRow> = state
                .contents
                .iter()
                .filter(|row| {
                    row.model == model && row.model_version == generation && row.kind == kind
                })
                .cloned()
                .collect();
            rows.sort_by_key(|row| (row.parent, row.rank));
            rows.into_iter().skip(offset).take(limit).collect()
        }))
    }

    fn content_count(
        &self,
        model: ObjectId,
        generation: u32,
        kind: ObjectKind,
    ) -> StoreResult<usize> {
        Ok(self.read(|state| {
            state
                .contents
                .iter()
                .filter(|row| {
                    row.model == model && row.model_version == generation && row.kind == kind
                })
                .count()
        }))
    }

    fn content_entry(
        &self,
        model: ObjectId,
        generation: u32,
        object: ObjectId,
    ) -> StoreResult<Option<ContentRow>> {
        Ok(self.read(|state| {
            state
                .contents
                .iter()
                .find(|row| {
                    row.model == model && row.model_version == generation && row.object == object
                })
                .cloned()
        }))
    }

    fn properties_of(&self, parent: ObjectId, version: u32) -> StoreResult<Vec<PropertyRow>> {
        Ok(self.read(|state| {
            let mut rows = state
                .properties
                .get(&(parent, version))
                .cloned()
                .unwrap_or_default();
            rows.sort_by_key(|row| row.rank);
            rows
        }))
    }

    fn features_of(&self, parent: ObjectId, version: u32) -> StoreResult<Vec<FeatureRow>> {
        Ok(self.read(|state| {
            state
                .features
                .get(&(parent, version))
                .cloned()
                .unwrap_or_default()
        }))
    }

    fn bendpoints_of(&self, parent: ObjectId, version: u32) -> StoreResult<Vec<BendpointRow>> {
        Ok(self.read(|state| {
            let mut rows = state
                .bendpoints
                .get(&(parent, version))
                .cloned()
                .unwrap_or_default();
            rows.sort_by_key(|row| row.rank);
            rows
        }))
    }

    fn image_path_taken(&self, path: &str, excluding: ObjectId) -> StoreResult<bool> {
        Ok(self.read(|state| {
            state.objects.iter().any(|((kind, id, _), row)| {
                *kind == ObjectKind::Image
                    && *id != excluding
                    && matches!(&row.payload, crate::rows::ObjectPayload::Image { path: p, .. } if p == path)
            })
        }))
    }

    fn all_object_keys(&self, kind: ObjectKind) -> StoreResult<Vec<(ObjectId, u32)>> {
        Ok(self.read(|state| {
            state
                .objects
                .keys()
                .filter(|(k, _, _)| *k == kind)
                .map(|(_, id, version)| (*id, *version))
                .collect()
        }))
    }

    fn generation_containing(
        &self,
        object: ObjectId,
        version: u32,
    ) -> StoreResult<Option<(ObjectId, u32)>> {
        Ok(self.read(|state| {
            state
                .contents
                .iter()
                .find(|row| row.object == object && row.object_version == version)
                .map(|row| (row.model, row.model_version))
        }))
    }

    fn update_checksum(
        &mut self,
        kind: ObjectKind,
        id: ObjectId,
        version: u32,
        checksum: String,
        container_checksum: Option<String>,
    ) -> StoreResult<()> {
        self.in_tx(|state| {
            let row = state.objects.get_mut(&(kind, id, version)).ok_or_else(|| {
                StoreError::row_not_found(format!("{} {} v{}", kind.label(), id, version))
            })?;
            row.checksum = checksum;
            row.container_checksum = container_checksum;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::ObjectPayload;

    fn profile_row(id: ObjectId, version: u32, name: &str) -> ObjectRow {
        ObjectRow {
            id,
            version,
            checksum: format!("sum-{name}-{version}"),
            container_checksum: None,
            created_by: "alice".into(),
            created_at: 0,
            payload: ObjectPayload::Profile {
                name: name.into(),
                applies_to: "element".into(),
                image_path: None,
            },
        }
    }

    #[test]
    fn new_store_is_at_the_expected_schema_version() {
        let store = MemoryStore::new();
        assert_eq!(store.schema_version().unwrap(), EXPECTED_SCHEMA_VERSION);
    }

    #[test]
    fn writes_outside_a_transaction_are_rejected() {
        let mut store = MemoryStore::new();
        let result = store.insert_object(profile_row(ObjectId::new(), 1, "loose"));
        assert!(matches!(result, Err(StoreError::Transaction { .. })));
    }

    #[test]
    fn rollback_discards_all_writes() {
        let mut store = MemoryStore::new();
        let id = ObjectId::new();
        store.begin().unwrap();
        store.insert_object(profile_row(id, 1, "gone")).unwrap();
        store.rollback().unwrap();
        assert!(store
            .object_at(ObjectKind::Profile, id, 1)
            .unwrap()
            .is_none());
        assert_eq!(store.object_row_count(), 0);
    }

    #[test]
    fn commit_makes_writes_visible() {
        let mut store = MemoryStore::new();
        let id = ObjectId::new();
        store.begin().unwrap();
        store.insert_object(profile_row(id, 1, "kept")).unwrap();
        store.commit().unwrap();
        assert!(store
            .object_at(ObjectKind::Profile, id, 1)
            .unwrap()
            .is_some());
    }

    #[test]
    fn duplicate_version_key_is_rejected() {
        let mut store = MemoryStore::new();
        let id = ObjectId::new();
        store.begin().unwrap();
        store.insert_object(profile_row(id, 1, "first")).unwrap();
        let result = store.insert_object(profile_row(id, 1, "second"));
        assert!(matches!(result, Err(StoreError::DuplicateVersion { .. })));
    }

    #[test]
    fn injected_commit_failure_leaves_committed_state_untouched() {
        let mut store = MemoryStore::new();
        let id = ObjectId::new();
        store.fail_next_commit();
        store.begin().unwrap();
        store.insert_object(profile_row(id, 1, "doomed")).unwrap();
        assert!(store.commit().is_err());
        assert!(!store.in_transaction());
        assert_eq!(store.object_row_count(), 0);
    }

    #[test]
    fn latest_stamp_picks_highest_version() {
        let mut store = MemoryStore::new();
        let id = ObjectId::new();
        store.begin().unwrap();
        store.insert_object(profile_row(id, 1, "p")).unwrap();
        store.insert_object(profile_row(id, 3, "p")).unwrap();
        store.insert_object(profile_row(id, 2, "p")).unwrap();
        store.commit().unwrap();
        let stamp = store.latest_stamp(ObjectKind::Profile, id).unwrap().unwrap();
        assert_eq!(stamp.version, 3);
    }

    #[test]
    fn contents_page_in_parent_then_rank_order() {
        let mut store = MemoryStore::new();
        let model = ObjectId::new();
        let parent = ObjectId::new();
        store.begin().unwrap();
        for rank in [2u32, 0, 1] {
            let id = ObjectId::new();
            store.insert_object(profile_row(id, 1, "p")).unwrap();
            store
                .insert_content(ContentRow {
                    model,
                    model_version: 1,
                    kind: ObjectKind::Profile,
                    object: id,
                    object_version: 1,
                    parent: Some(parent),
                    rank,
                })
                .unwrap();
        }
        store.commit().unwrap();

        let page = store
            .contents_of(model, 1, ObjectKind::Profile, 0, 2)
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].rank, 0);
        assert_eq!(page[1].rank, 1);
        let rest = store
            .contents_of(model, 1, ObjectKind::Profile, 2, 100)
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].rank, 2);
    }

    #[test]
    fn stamps_in_generation_flag_dangling_containment() {
        let mut store = MemoryStore::new();
        let model = ObjectId::new();
        store.begin().unwrap();
        store
            .insert_content(ContentRow {
                model,
                model_version: 1,
                kind: ObjectKind::Profile,
                object: ObjectId::new(),
                object_version: 7,
                parent: None,
                rank: 0,
            })
            .unwrap();
        store.commit().unwrap();
        let result = store.stamps_in_generation(model, 1, ObjectKind::Profile);
        assert!(matches!(result, Err(StoreError::Integrity { .. })));
    }

    #[test]
    fn image_path_taken_ignores_the_same_image() {
        let mut store = MemoryStore::new();
        let id = ObjectId::new();
        store.begin().unwrap();
        store
            .insert_object(ObjectRow {
                id,
                version: 1,
                checksum: "sum".into(),
                container_checksum: None,
                created_by: "alice".into(),
                created_at: 0,
                payload: ObjectPayload::Image {
                    path: "images/logo.png".into(),
                    bytes: vec![1, 2, 3],
                },
            })
            .unwrap();
        store.commit().unwrap();

        assert!(!store.image_path_taken("images/logo.png", id).unwrap());
        assert!(store
            .image_path_taken("images/logo.png", ObjectId::new())
            .unwrap());
    }

    proptest::proptest! {
        #[test]
        fn paging_never_loses_or_duplicates_rows(count in 0usize..40, page in 1usize..17) {
            let mut store = MemoryStore::new();
            let model = ObjectId::new();
            store.begin().unwrap();
            for rank in 0..count {
                let id = ObjectId::new();
                store.insert_object(profile_row(id, 1, "p")).unwrap();
                store
                    .insert_content(ContentRow {
                        model,
                        model_version: 1,
                        kind: ObjectKind::Profile,
                        object: id,
                        object_version: 1,
                        parent: None,
                        rank: rank as u32,
                    })
                    .unwrap();
            }
            store.commit().unwrap();

            let mut seen = Vec::new();
            let mut offset = 0;
            loop {
                let rows = store
                    .contents_of(model, 1, ObjectKind::Profile, offset, page)
                    .unwrap();
                if rows.is_empty() {
                    break;
                }
                offset += rows.len();
                seen.extend(rows);
            }
            proptest::prop_assert_eq!(seen.len(), count);
            for (rank, row) in seen.iter().enumerate() {
                proptest::prop_assert_eq!(row.rank, rank as u32);
            }
        }
    }

    #[test]
    fn update_checksum_rewrites_an_existing_row() {
        let mut store = MemoryStore::new();
        let id = ObjectId::new();
        store.begin().unwrap();
        store.insert_object(profile_row(id, 1, "p")).unwrap();
        store
            .update_checksum(ObjectKind::Profile, id, 1, "fresh".into(), None)
            .unwrap();
        store.commit().unwrap();
        let row = store.object_at(ObjectKind::Profile, id, 1).unwrap().unwrap();
        assert_eq!(row.checksum, "fresh");
    }
}
