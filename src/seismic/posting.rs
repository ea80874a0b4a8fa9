//! In-memory clustered posting store
//!
//! One [`ClusteredPostingIndex`] per `(segment, field)`. Single-writer
//! during a merge, multi-reader after publish — enforced by caller
//! discipline (one merge thread owns the writer handle) rather than a new
//! lock, using `dashmap` rather than a hand-rolled `RwLock<HashMap<..>>`.

use dashmap::DashMap;
use std::sync::Arc;

use super::cluster::PostingClusters;

/// Identifies one segment+field pair whose postings are clustered
/// independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub segment_id: u64,
    pub field_id: u32,
}

impl CacheKey {
    pub fn new(segment_id: u64, field_id: u32) -> Self {
        Self { segment_id, field_id }
    }
}

/// A term → [`PostingClusters`] store for one `(segment, field)`.
#[derive(Debug, Default)]
pub struct ClusteredPostingIndex {
    terms: DashMap<Vec<u8>, PostingClusters>,
}

impl ClusteredPostingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `(term, clusters)`. Each term must be inserted at most once
    /// per writer session; a second insert for the same term is a
    /// programmer error in the caller (the merge thread), so it overwrites
    /// rather than merges — callers wanting to detect double-insert should
    /// use [`ClusteredPostingIndex::contains`] first.
    pub fn insert(&self, term: Vec<u8>, clusters: PostingClusters) {
        self.terms.insert(term, clusters);
    }

    pub fn contains(&self, term: &[u8]) -> bool {
        self.terms.contains_key(term)
    }

    pub fn get(&self, term: &[u8]) -> Option<PostingClusters> {
        self.terms.get(term).map(|entry| entry.value().clone())
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Sum of every posting's `ram_bytes()`, the only observable "cost" of
    /// this cache entry for an LRU host manager.
    pub fn ram_bytes(&self) -> usize {
        self.terms.iter().map(|entry| entry.value().ram_bytes()).sum()
    }
}

/// Owns every `(segment, field)` store, mediating access via a top-level
/// manager rather than scattered global statics.
#[derive(Debug, Default)]
pub struct PostingStoreManager {
    indexes: DashMap<CacheKey, Arc<ClusteredPostingIndex>>,
}

impl PostingStoreManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch or lazily create the index for `key`. The first writer to
    /// call this for a fresh segment owns the returned handle exclusively
    /// until publish.
    pub fn index_for(&self, key: CacheKey) -> Arc<ClusteredPostingIndex> {
        self.indexes
            .entry(key)
            .or_insert_with(|| Arc::new(ClusteredPostingIndex::new()))
            .clone()
    }

    /// Drop a segment's index entirely, e.g. after the segment is merged
    /// away.
    pub fn evict(&self, key: CacheKey) {
        self.indexes.remove(&key);
    }

    pub fn total_ram_bytes(&self) -> usize {
        self.indexes.iter().map(|entry| entry.value().ram_bytes()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seismic::vector::DocWeight;

    fn sample_clusters() -> PostingClusters {
        let cluster = super::super::cluster::cluster(
            &[DocWeight::new(0, 5), DocWeight::new(1, 9)],
            &super::super::cluster::SeismicConfig {
                n_postings: 10,
                summary_prune_ratio: 1.0,
                cluster_ratio: 0.0,
                approximate_threshold: 100,
            },
            &crate::seismic::reader::MapSparseVectorReader::new(),
        );
        PostingClusters::new(cluster)
    }

    #[test]
    fn insert_then_get_round_trips() {
        let index = ClusteredPostingIndex::new();
        index.insert(b"token".to_vec(), sample_clusters());
        assert!(index.contains(b"token"));
        assert_eq!(index.get(b"token").unwrap().size(), 2);
    }

    #[test]
    fn manager_returns_same_index_for_same_key() {
        let manager = PostingStoreManager::new();
        let key = CacheKey::new(1, 7);
        let a = manager.index_for(key);
        a.insert(b"t".to_vec(), sample_clusters());
        let b = manager.index_for(key);
        assert!(b.contains(b"t"));
    }

    #[test]
    fn evict_removes_the_segment_index() {
        let manager = PostingStoreManager::new();
        let key = CacheKey::new(2, 1);
        manager.index_for(key).insert(b"t".to_vec(), sample_clusters());
        manager.evict(key);
        let fresh = manager.index_for(key);
        assert!(!fresh.contains(b"t"));
    }

    #[test]
    fn ram_bytes_reflects_inserted_clusters() {
        let index = ClusteredPostingIndex::new();
        assert_eq!(index.ram_bytes(), 0);
        index.insert(b"t".to_vec(), sample_clusters());
        assert!(index.ram_bytes() > 0);
    }
}
