//! Per-object versioning metadata and synchronization status.

use crate::version::VersionRecord;

/// Synchronization status of one object, derived from its four version
/// records.
///
/// `Conflicting` is a first-class, user-resolvable state, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SyncStatus {
    /// Created in memory, never persisted.
    NewInModel,
    /// In-memory content matches the latest persisted version.
    #[default]
    Synced,
    /// Changed locally, unchanged remotely.
    UpdatedInModel,
    /// Unchanged locally, a newer version exists in the store.
    UpdatedInDatabase,
    /// Changed locally *and* a diverging newer version exists in the store.
    Conflicting,
    /// Present in the store's latest generation, deleted from the model.
    DeletedInModel,
    /// Present in the store's latest generation, never seen by this model.
    NewInDatabase,
    /// Present in the model, dropped from the store's latest generation.
    DeletedInDatabase,
}

impl SyncStatus {
    /// Returns true if the object diverged locally and remotely.
    #[must_use]
    pub fn is_conflicting(&self) -> bool {
        matches!(self, SyncStatus::Conflicting)
    }

    /// Returns true if exporting would write a new version of this object.
    #[must_use]
    pub fn needs_export(&self) -> bool {
        matches!(self, SyncStatus::NewInModel | SyncStatus::UpdatedInModel)
    }

    /// Returns true if the store holds content this model has not seen.
    #[must_use]
    pub fn needs_import(&self) -> bool {
        matches!(self, SyncStatus::UpdatedInDatabase | SyncStatus::NewInDatabase)
    }

    /// Returns true if the object requires no action.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncStatus::Synced)
    }
}

/// The four version records tracked for every identified versioned object,
/// plus the derivation of its [`SyncStatus`].
///
/// - `initial`: the version as it was when loaded into memory (zero if the
///   object was created locally).
/// - `current`: the version that will be (or was just) written; its
///   checksum is recomputed from live in-memory state by the comparison
///   pass.
/// - `database`: the version belonging to the model's own last-known
///   database generation.
/// - `latest_database`: the absolute newest version in the store,
///   regardless of which model generation wrote it.
#[derive(Debug, Clone, Default)]
pub struct VersionedMetadata {
    /// Version when loaded into memory.
    pub initial: VersionRecord,
    /// Version that will be written next.
    pub current: VersionRecord,
    /// Version in the model's own last-known generation.
    pub database: VersionRecord,
    /// Absolute newest version in the store.
    pub latest_database: VersionRecord,
    in_model: bool,
}

impl VersionedMetadata {
    /// Metadata for an object created locally by the user.
    #[must_use]
    pub fn created_in_model() -> Self {
        Self {
            in_model: true,
            ..Self::default()
        }
    }

    /// Metadata for an object materialized by the import pipeline.
    ///
    /// `initial`, `database` and `latest_database` all start at the row that
    /// was read; `current` stays unset until the next comparison pass.
    #[must_use]
    pub fn imported(record: VersionRecord) -> Self {
        Self {
            initial: record.clone(),
            current: VersionRecord::new(),
            database: record.clone(),
            latest_database: record,
            in_model: true,
        }
    }

    /// Bare metadata for an object present in the store but absent from the
    /// in-memory graph.
    ///
    /// `initial` is the version the model's generation knew (persisted if
    /// the model once held the object, zero if it never saw it) and drives
    /// the [`SyncStatus::DeletedInModel`] / [`SyncStatus::NewInDatabase`]
    /// distinction.
    #[must_use]
    pub fn absent(initial: VersionRecord, latest_database: VersionRecord) -> Self {
        Self {
            initial,
            current: VersionRecord::new(),
            database: VersionRecord::new(),
            latest_database,
            in_model: false,
        }
    }

    /// Returns true if the object is held in the in-memory graph.
    #[must_use]
    pub fn in_model(&self) -> bool {
        self.in_model
    }

    /// Derives the synchronization status from the four version records.
    ///
    /// Pure function; nothing is persisted. The comparison engine is
    /// responsible for populating `database` and `latest_database` before
    /// asking.
    #[must_use]
    pub fn sync_status(&self) -> SyncStatus {
        if !self.in_model {
            return if self.initial.is_persisted() {
                SyncStatus::DeletedInModel
            } else {
                SyncStatus::NewInDatabase
            };
        }

        if !self.initial.is_persisted() {
            // Brand new locally, unless cross-model sharing put a row with
            // this identifier in the store first.
            return if self.latest_database.is_persisted() {
                if self.current.same_checksum(&self.latest_database) {
                    SyncStatus::Synced
                } else {
                    SyncStatus::Conflicting
                }
            } else {
                SyncStatus::NewInModel
            };
        }

        if !self.database.is_persisted() {
            // The model's own latest generation no longer references it.
            return SyncStatus::DeletedInDatabase;
        }

        let same_content = self.current.same_checksum(&self.database);
        let same_version = self.database.version == self.latest_database.version;
        match (same_content, same_version) {
            (true, true) => SyncStatus::Synced,
            (false, true) => SyncStatus::UpdatedInModel,
            (true, false) => SyncStatus::UpdatedInDatabase,
            (false, false) => SyncStatus::Conflicting,
        }
    }

    /// Adopts a store version discovered by the comparison second pass.
    ///
    /// Used when a locally-created object turns out to already exist in the
    /// store with identical content (shared across models): the found
    /// version becomes the baseline so the next export does not rewrite it.
    pub fn adopt(&mut self, record: VersionRecord) {
        self.initial = record.clone();
        self.database = record.clone();
        self.latest_database = record;
    }

    /// Promotes `current` to the new baseline after a successful export.
    ///
    /// The freshly written version is by definition also the model's
    /// generation version and the latest version in the store.
    pub fn promote_current(&mut self) {
        self.initial = self.current.clone();
        self.database = self.current.clone();
        self.latest_database = self.current.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(version: u32, checksum: &str) -> VersionRecord {
        VersionRecord::persisted(version, checksum, 1000)
    }

    fn metadata(
        initial: VersionRecord,
        current: VersionRecord,
        database: VersionRecord,
        latest: VersionRecord,
    ) -> VersionedMetadata {
        VersionedMetadata {
            initial,
            current,
            database,
            latest_database: latest,
            in_model: true,
        }
    }

    #[test]
    fn new_in_model() {
        let meta = VersionedMetadata::created_in_model();
        assert_eq!(meta.sync_status(), SyncStatus::NewInModel);
        assert!(meta.sync_status().needs_export());
    }

    #[test]
    fn synced() {
        let meta = metadata(
            record(3, "a"),
            record(3, "a"),
            record(3, "a"),
            record(3, "a"),
        );
        assert_eq!(meta.sync_status(), SyncStatus::Synced);
    }

    #[test]
    fn updated_in_model() {
        let meta = metadata(
            record(3, "a"),
            record(3, "b"),
            record(3, "a"),
            record(3, "a"),
        );
        assert_eq!(meta.sync_status(), SyncStatus::UpdatedInModel);
    }

    #[test]
    fn updated_in_database() {
        let meta = metadata(
            record(3, "a"),
            record(3, "a"),
            record(3, "a"),
            record(4, "b"),
        );
        assert_eq!(meta.sync_status(), SyncStatus::UpdatedInDatabase);
        assert!(meta.sync_status().needs_import());
    }

    #[test]
    fn conflicting() {
        // Local edit bumped the checksum while another writer pushed
        // version 4 with different content.
        let meta = metadata(
            record(3, "a"),
            record(3, "local"),
            record(3, "a"),
            record(4, "remote"),
        );
        assert_eq!(meta.sync_status(), SyncStatus::Conflicting);
        assert!(meta.sync_status().is_conflicting());
    }

    #[test]
    fn deleted_in_database() {
        let meta = metadata(
            record(3, "a"),
            record(3, "a"),
            VersionRecord::new(),
            VersionRecord::new(),
        );
        assert_eq!(meta.sync_status(), SyncStatus::DeletedInDatabase);
    }

    #[test]
    fn deleted_in_model_vs_new_in_database() {
        let deleted = VersionedMetadata::absent(record(2, "a"), record(2, "a"));
        assert_eq!(deleted.sync_status(), SyncStatus::DeletedInModel);
        assert!(!deleted.in_model());

        let foreign = VersionedMetadata::absent(VersionRecord::new(), record(1, "b"));
        assert_eq!(foreign.sync_status(), SyncStatus::NewInDatabase);
    }

    #[test]
    fn cross_model_sharing_identical_content_is_synced() {
        // New in memory, but a same-identifier row already exists at
        // version 1 with an identical checksum.
        let mut meta = VersionedMetadata::created_in_model();
        meta.current = VersionRecord {
            checksum: "shared".into(),
            ..VersionRecord::new()
        };
        meta.latest_database = record(1, "shared");
        assert_eq!(meta.sync_status(), SyncStatus::Synced);
    }

    #[test]
    fn cross_model_sharing_divergent_content_conflicts() {
        let mut meta = VersionedMetadata::created_in_model();
        meta.current = VersionRecord {
            checksum: "local".into(),
            ..VersionRecord::new()
        };
        meta.latest_database = record(1, "remote");
        assert_eq!(meta.sync_status(), SyncStatus::Conflicting);
    }

    #[test]
    fn adopt_makes_synced() {
        let mut meta = VersionedMetadata::created_in_model();
        meta.current = VersionRecord {
            checksum: "shared".into(),
            ..VersionRecord::new()
        };
        meta.adopt(record(1, "shared"));
        assert_eq!(meta.sync_status(), SyncStatus::Synced);
        assert_eq!(meta.initial.version, 1);
    }

    #[test]
    fn imported_metadata_baselines() {
        let meta = VersionedMetadata::imported(record(5, "x"));
        assert_eq!(meta.initial.version, 5);
        assert_eq!(meta.database.version, 5);
        assert_eq!(meta.latest_database.version, 5);
        assert!(!meta.current.is_persisted());
        assert!(meta.in_model());
    }

    #[test]
    fn promote_current_resets_baselines() {
        let mut meta = metadata(
            record(3, "a"),
            record(4, "b"),
            record(3, "a"),
            record(3, "a"),
        );
        meta.promote_current();
        assert_eq!(meta.initial.version, 4);
        assert_eq!(meta.database.version, 4);
        assert_eq!(meta.latest_database.version, 4);
        assert_eq!(meta.sync_status(), SyncStatus::Synced);
    }
}
