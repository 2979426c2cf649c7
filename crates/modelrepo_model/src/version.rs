//! Version records.

use std::time::{SystemTime, UNIX_EPOCH};

/// One immutable snapshot of an object's persisted state.
///
/// A version number of `0` means "never persisted". Version numbers are
/// monotonically increasing per identifier, not per repository.
///
/// `container_checksum` is populated only for container objects (views and
/// the model root). It additionally captures the combined state of all
/// children, so "did my whole subtree change" is a single string compare
/// instead of a recursive walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionRecord {
    /// Per-identifier version number. Zero means never persisted.
    pub version: u32,
    /// Structural checksum of the object's semantic content.
    pub checksum: String,
    /// Combined subtree checksum for container objects.
    pub container_checksum: Option<String>,
    /// When this version was written (Unix timestamp in milliseconds).
    pub timestamp: u64,
}

impl VersionRecord {
    /// Creates an empty record (version 0, no checksum).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record for a persisted version.
    #[must_use]
    pub fn persisted(version: u32, checksum: impl Into<String>, timestamp: u64) -> Self {
        Self {
            version,
            checksum: checksum.into(),
            container_checksum: None,
            timestamp,
        }
    }

    /// Returns true if this record describes a persisted version.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }

    /// Returns true if both records carry the same content checksum.
    #[must_use]
    pub fn same_checksum(&self, other: &VersionRecord) -> bool {
        self.checksum == other.checksum
    }

    /// Returns true if the container checksums match.
    ///
    /// Records without a container checksum compare equal only to other
    /// records without one.
    #[must_use]
    pub fn same_container_checksum(&self, other: &VersionRecord) -> bool {
        self.container_checksum == other.container_checksum
    }

    /// Resets the record back to "never persisted".
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Returns the current time as Unix milliseconds.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_not_persisted() {
        let record = VersionRecord::new();
        assert_eq!(record.version, 0);
        assert!(!record.is_persisted());
    }

    #[test]
    fn persisted_record() {
        let record = VersionRecord::persisted(3, "abc", 1000);
        assert!(record.is_persisted());
        assert_eq!(record.version, 3);
        assert_eq!(record.checksum, "abc");
    }

    #[test]
    fn checksum_comparison() {
        let a = VersionRecord::persisted(1, "same", 0);
        let b = VersionRecord::persisted(2, "same", 5);
        let c = VersionRecord::persisted(1, "other", 0);
        assert!(a.same_checksum(&b));
        assert!(!a.same_checksum(&c));
    }

    #[test]
    fn container_checksum_comparison() {
        let mut a = VersionRecord::persisted(1, "x", 0);
        let mut b = VersionRecord::persisted(1, "x", 0);
        assert!(a.same_container_checksum(&b));

        a.container_checksum = Some("sub".into());
        assert!(!a.same_container_checksum(&b));

        b.container_checksum = Some("sub".into());
        assert!(a.same_container_checksum(&b));
    }

    #[test]
    fn reset_clears_everything() {
        let mut record = VersionRecord::persisted(7, "abc", 42);
        record.container_checksum = Some("def".into());
        record.reset();
        assert_eq!(record, VersionRecord::new());
    }

    #[test]
    fn now_millis_is_nonzero() {
        assert!(now_millis() > 0);
    }
}
