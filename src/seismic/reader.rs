//! Pluggable reader capability handed to the clustering driver
//!
//! Modelled as a single-method capability interface, not a superclass —
//! implementations can wrap an on-disk segment plus an in-memory cache, or
//! fall through to a partially-built new segment during merge. The driver
//! only ever borrows a `&dyn SparseVectorReader`.

use super::vector::SparseVector;

/// Resolves a shard-local doc id to its sparse vector, if present.
pub trait SparseVectorReader: Send + Sync {
    /// Returns `None` if the document has no vector for the field being
    /// clustered (deleted, or simply absent for that field).
    fn read(&self, doc_id: i32) -> Option<SparseVector>;
}

/// An in-memory reader over a fixed map, useful for tests and for small
/// segments fully resident during merge.
#[derive(Debug, Default)]
pub struct MapSparseVectorReader {
    vectors: std::collections::HashMap<i32, SparseVector>,
}

impl MapSparseVectorReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, doc_id: i32, vector: SparseVector) {
        self.vectors.insert(doc_id, vector);
    }
}

impl SparseVectorReader for MapSparseVectorReader {
    fn read(&self, doc_id: i32) -> Option<SparseVector> {
        self.vectors.get(&doc_id).cloned()
    }
}
