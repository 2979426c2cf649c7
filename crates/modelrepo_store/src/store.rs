//! Store boundary trait definition.

use modelrepo_model::{ObjectId, ObjectKind};

use crate::error::StoreResult;
use crate::rows::{
    BendpointRow, ContentRow, FeatureRow, ModelRow, ObjectRow, PropertyRow, VersionStamp,
};

/// The relational boundary of a model repository.
///
/// A store keeps the full version history of every model and object: rows
/// are only ever inserted, never updated or deleted, with one exception
/// (checksum backfill during a schema upgrade). The composite key
/// `(id, version)` is unique per table.
///
/// # Invariants
///
/// - Writes happen only between `begin` and `commit`
/// - A rolled-back transaction leaves no trace of its writes
/// - Inserting a duplicate `(id, version)` key fails the transaction
///
/// # Implementors
///
/// - [`super::MemoryStore`] - For testing and embedded use
pub trait ModelStore: Send + Sync {
    /// Opens a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if a transaction is already open or the
    /// connection is unavailable.
    fn begin(&mut self) -> StoreResult<()>;

    /// Commits the open transaction, making its writes visible.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open or the commit fails.
    fn commit(&mut self) -> StoreResult<()>;

    /// Discards the open transaction and every write it made.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open.
    fn rollback(&mut self) -> StoreResult<()>;

    /// Whether a transaction is currently open.
    fn in_transaction(&self) -> bool;

    /// Reads the schema version recorded in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema version row is missing.
    fn schema_version(&self) -> StoreResult<u32>;

    /// Records a new schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn set_schema_version(&mut self, version: u32) -> StoreResult<()>;

    /// Inserts one model version row.
    ///
    /// # Errors
    ///
    /// Returns an error outside a transaction or on a duplicate
    /// `(id, version)` key.
    fn insert_model(&mut self, row: ModelRow) -> StoreResult<()>;

    /// Reads one model version row.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn model_at(&self, id: ObjectId, version: u32) -> StoreResult<Option<ModelRow>>;

    /// The highest committed version of a model, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn latest_model_version(&self, id: ObjectId) -> StoreResult<Option<u32>>;

    /// Inserts one object version row.
    ///
    /// # Errors
    ///
    /// Returns an error outside a transaction or on a duplicate
    /// `(id, version)` key.
    fn insert_object(&mut self, row: ObjectRow) -> StoreResult<()>;

    /// Inserts one containment junction row.
    ///
    /// # Errors
    ///
    /// Returns an error outside a transaction.
    fn insert_content(&mut self, row: ContentRow) -> StoreResult<()>;

    /// Inserts property child rows.
    ///
    /// # Errors
    ///
    /// Returns an error outside a transaction.
    fn insert_properties(&mut self, rows: Vec<PropertyRow>) -> StoreResult<()>;

    /// Inserts feature child rows.
    ///
    /// # Errors
    ///
    /// Returns an error outside a transaction.
    fn insert_features(&mut self, rows: Vec<FeatureRow>) -> StoreResult<()>;

    /// Inserts bend-point child rows.
    ///
    /// # Errors
    ///
    /// Returns an error outside a transaction.
    fn insert_bendpoints(&mut self, rows: Vec<BendpointRow>) -> StoreResult<()>;

    /// Reads one object version row.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn object_at(
        &self,
        kind: ObjectKind,
        id: ObjectId,
        version: u32,
    ) -> StoreResult<Option<ObjectRow>>;

    /// The stamp of the highest committed version of an object across all
    /// models, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn latest_stamp(&self, kind: ObjectKind, id: ObjectId) -> StoreResult<Option<VersionStamp>>;

    /// Stamps of every object of `kind` contained in one model generation.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn stamps_in_generation(
        &self,
        model: ObjectId,
        generation: u32,
        kind: ObjectKind,
    ) -> StoreResult<Vec<VersionStamp>>;

    /// The stamp of one object as contained in one model generation.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn stamp_in_generation(
        &self,
        model: ObjectId,
        generation: u32,
        kind: ObjectKind,
        id: ObjectId,
    ) -> StoreResult<Option<VersionStamp>>;

    /// A page of containment rows for one model generation and kind,
    /// ordered by parent then rank.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn contents_of(
        &self,
        model: ObjectId,
        generation: u32,
        kind: ObjectKind,
        offset: usize,
        limit: usize,
    ) -> StoreResult<Vec<ContentRow>>;

    /// Number of containment rows for one model generation and kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn content_count(&self, model: ObjectId, generation: u32, kind: ObjectKind)
        -> StoreResult<usize>;

    /// The containment row of one object in one model generation, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn content_entry(
        &self,
        model: ObjectId,
        generation: u32,
        object: ObjectId,
    ) -> StoreResult<Option<ContentRow>>;

    /// Property child rows of one object version, in rank order.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn properties_of(&self, parent: ObjectId, version: u32) -> StoreResult<Vec<PropertyRow>>;

    /// Feature child rows of one object version.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn features_of(&self, parent: ObjectId, version: u32) -> StoreResult<Vec<FeatureRow>>;

    /// Bend-point child rows of one object version, in rank order.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn bendpoints_of(&self, parent: ObjectId, version: u32) -> StoreResult<Vec<BendpointRow>>;

    /// Whether an image row with the given path exists under a different
    /// identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn image_path_taken(&self, path: &str, excluding: ObjectId) -> StoreResult<bool>;

    /// Every `(id, version)` key of one kind, across all models.
    ///
    /// Used by schema upgrades that backfill a column over the full
    /// history.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn all_object_keys(&self, kind: ObjectKind) -> StoreResult<Vec<(ObjectId, u32)>>;

    /// Any `(model, generation)` whose junction rows reference one object
    /// version.
    ///
    /// Used by schema upgrades that rebuild containment lists from
    /// junction ranks.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn generation_containing(
        &self,
        object: ObjectId,
        version: u32,
    ) -> StoreResult<Option<(ObjectId, u32)>>;

    /// Overwrites the stored checksums of one object version row.
    ///
    /// This is the single mutating exception to insert-only history and
    /// exists for schema upgrades only.
    ///
    /// # Errors
    ///
    /// Returns an error outside a transaction or if the row is missing.
    fn update_checksum(
        &mut self,
        kind: ObjectKind,
        id: ObjectId,
        version: u32,
        checksum: String,
        container_checksum: Option<String>,
    ) -> StoreResult<()>;
}
