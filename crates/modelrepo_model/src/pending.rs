//! Deferred endpoint-reference registry.
//!
//! The import pipeline materializes objects one kind at a time. A
//! relationship or connection can reference an endpoint that has not been
//! materialized yet (a forward declaration); such references are parked
//! here and resolved once at the end of the pass. Anything still pending
//! after the final pass is a fatal integrity error, never a dangling
//! reference.

use crate::id::ObjectId;
use std::collections::BTreeMap;

/// Which slot of the waiting object holds the deferred reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefRole {
    /// `Relationship::source`.
    RelationshipSource,
    /// `Relationship::target`.
    RelationshipTarget,
    /// `ViewNode::element`.
    ViewNodeElement,
    /// `ViewConnection::relationship`.
    ConnectionRelationship,
    /// `ViewConnection::source`.
    ConnectionSource,
    /// `ViewConnection::target`.
    ConnectionTarget,
}

/// One parked reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRef {
    /// The object holding the reference.
    pub waiting: ObjectId,
    /// The slot the reference lives in.
    pub role: RefRole,
}

/// Arena of pending edges keyed by the awaited identifier.
#[derive(Debug, Default)]
pub struct PendingRefs {
    pending: BTreeMap<ObjectId, Vec<PendingRef>>,
}

impl PendingRefs {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks a reference until `awaited` materializes.
    pub fn defer(&mut self, awaited: ObjectId, waiting: ObjectId, role: RefRole) {
        self.pending
            .entry(awaited)
            .or_default()
            .push(PendingRef { waiting, role });
    }

    /// Number of distinct awaited identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Resolves every entry whose awaited identifier now exists.
    ///
    /// `exists` is the membership test over the materialized graph. Returns
    /// the entries that stayed unresolved, keyed by awaited identifier; the
    /// registry is left empty either way.
    pub fn resolve<F>(&mut self, exists: F) -> Vec<(ObjectId, PendingRef)>
    where
        F: Fn(ObjectId) -> bool,
    {
        let mut unresolved = Vec::new();
        for (awaited, refs) in std::mem::take(&mut self.pending) {
            if !exists(awaited) {
                unresolved.extend(refs.into_iter().map(|r| (awaited, r)));
            }
        }
        unresolved
    }

    /// Drops all pending entries.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
