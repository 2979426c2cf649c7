//! Structural checksum engine.
//!
//! Checksums are deterministic SHA-256 digests over a canonical, type-tagged
//! rendering of an object's semantic fields. The identifier is excluded so a
//! checksum detects content change independent of identity. Unordered
//! attribute sets are sorted before hashing; ordered children are hashed in
//! rank order. Two objects with identical semantic content and children
//! produce identical checksums regardless of when or where they were
//! computed, so the checksum doubles as the optimistic-concurrency token
//! stored per version row.

use sha2::{Digest, Sha256};

/// Incremental builder for a structural checksum.
///
/// Every field is written with a tag and a length prefix, so `("ab", "c")`
/// and `("a", "bc")` never collide and absent optional fields are
/// distinguishable from empty ones.
#[derive(Debug, Default)]
pub struct ChecksumBuilder {
    hasher: Sha256,
}

impl ChecksumBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes one tagged field.
    pub fn field(&mut self, tag: &str, value: &str) -> &mut Self {
        self.raw(tag.as_bytes());
        self.raw(value.as_bytes());
        self
    }

    /// Writes one tagged numeric field.
    pub fn number(&mut self, tag: &str, value: i64) -> &mut Self {
        self.field(tag, &value.to_string())
    }

    /// Writes an optional field with an explicit presence marker.
    pub fn opt_field(&mut self, tag: &str, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) => {
                self.raw(b"+");
                self.field(tag, v)
            }
            None => {
                self.raw(b"-");
                self.raw(tag.as_bytes());
                self
            }
        }
    }

    /// Writes an unordered set of `(name, value)` entries.
    ///
    /// Entries are sorted before hashing so physical memory order does not
    /// affect the result.
    pub fn unordered_set<'a, I>(&mut self, tag: &str, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut sorted: Vec<(&str, &str)> = entries.into_iter().collect();
        sorted.sort_unstable();
        self.raw(tag.as_bytes());
        self.number("n", sorted.len() as i64);
        for (name, value) in sorted {
            self.field(name, value);
        }
        self
    }

    /// Writes one tagged binary field.
    pub fn bytes(&mut self, tag: &str, value: &[u8]) -> &mut Self {
        self.raw(tag.as_bytes());
        self.raw(value);
        self
    }

    /// Appends a child checksum. Call in rank order; order matters.
    pub fn child(&mut self, checksum: &str) -> &mut Self {
        self.raw(b"child");
        self.raw(checksum.as_bytes());
        self
    }

    /// Finishes and returns the hex-encoded digest.
    #[must_use]
    pub fn finish(self) -> String {
        let digest = self.hasher.finalize();
        let mut out = String::with_capacity(64);
        for byte in digest {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }

    fn raw(&mut self, bytes: &[u8]) {
        // Length prefix keeps adjacent writes unambiguous.
        self.hasher.update((bytes.len() as u64).to_be_bytes());
        self.hasher.update(bytes);
    }
}

/// Anything whose semantic content can be checksummed.
pub trait Checksummed {
    /// Feeds the object's semantic fields (never its identifier) into the
    /// builder.
    fn write_content(&self, builder: &mut ChecksumBuilder);

    /// Computes the hex-encoded structural checksum.
    fn checksum(&self) -> String {
        let mut builder = ChecksumBuilder::new();
        self.write_content(&mut builder);
        builder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hash_fields(fields: &[(&str, &str)]) -> String {
        let mut builder = ChecksumBuilder::new();
        for (tag, value) in fields {
            builder.field(tag, value);
        }
        builder.finish()
    }

    #[test]
    fn stable_across_calls() {
        let a = hash_fields(&[("name", "server"), ("doc", "primary")]);
        let b = hash_fields(&[("name", "server"), ("doc", "primary")]);
        assert_eq!(a, b);
    }

    #[test]
    fn field_change_changes_checksum() {
        let a = hash_fields(&[("name", "server")]);
        let b = hash_fields(&[("name", "server2")]);
        assert_ne!(a, b);
    }

    #[test]
    fn field_boundaries_do_not_collide() {
        let a = hash_fields(&[("name", "ab"), ("doc", "c")]);
        let b = hash_fields(&[("name", "a"), ("doc", "bc")]);
        assert_ne!(a, b);
    }

    #[test]
    fn absent_differs_from_empty() {
        let mut a = ChecksumBuilder::new();
        a.opt_field("viewpoint", None);
        let mut b = ChecksumBuilder::new();
        b.opt_field("viewpoint", Some(""));
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn unordered_set_ignores_order() {
        let mut a = ChecksumBuilder::new();
        a.unordered_set("features", vec![("x", "1"), ("y", "2")]);
        let mut b = ChecksumBuilder::new();
        b.unordered_set("features", vec![("y", "2"), ("x", "1")]);
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn child_order_matters() {
        let mut a = ChecksumBuilder::new();
        a.child("c1").child("c2");
        let mut b = ChecksumBuilder::new();
        b.child("c2").child("c1");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn digest_is_hex_sha256() {
        let checksum = hash_fields(&[("name", "x")]);
        assert_eq!(checksum.len(), 64);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit()));
    }

    proptest! {
        #[test]
        fn deterministic_for_any_input(fields in proptest::collection::vec(("[a-z]{1,8}", ".{0,16}"), 0..8)) {
            let refs: Vec<(&str, &str)> =
                fields.iter().map(|(t, v)| (t.as_str(), v.as_str())).collect();
            prop_assert_eq!(hash_fields(&refs), hash_fields(&refs));
        }

        #[test]
        fn set_permutation_invariant(mut entries in proptest::collection::vec(("[a-z]{1,6}", "[a-z]{0,6}"), 0..6)) {
            let forward: Vec<(&str, &str)> =
                entries.iter().map(|(n, v)| (n.as_str(), v.as_str())).collect();
            let mut a = ChecksumBuilder::new();
            a.unordered_set("s", forward);
            let a = a.finish();

            entries.reverse();
            let reversed: Vec<(&str, &str)> =
                entries.iter().map(|(n, v)| (n.as_str(), v.as_str())).collect();
            let mut b = ChecksumBuilder::new();
            b.unordered_set("s", reversed);
            prop_assert_eq!(a, b.finish());
        }
    }
}
