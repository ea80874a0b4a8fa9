//! Clustering driver: top-K prune + random clustering + summarisation
//!
//! Produces the [`DocumentCluster`]s that make up one term's [`PostingClusters`].
//! Centre selection is a non-deterministic draw over surviving doc ids;
//! `fastrand` is used rather than `rand` since nothing here needs a
//! cryptographically strong RNG.

use std::collections::BinaryHeap;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::reader::SparseVectorReader;
use super::vector::{DocWeight, SparseVector};

/// Minimum surviving posting size before clustering is attempted; smaller
/// postings are returned as a single `should_not_skip` cluster with no
/// summary.
pub const MINIMAL_DOC_SIZE_TO_CLUSTER: usize = 10;

/// Index-time configuration for one field's SEISMIC clustering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeismicConfig {
    /// Top-K cap on input postings before clustering; `0` yields an empty
    /// result for that term.
    pub n_postings: u32,
    /// Retention ratio of cluster summary weight mass, `(0, 1]`.
    pub summary_prune_ratio: f32,
    /// Controls cluster count relative to posting size, `(0, 1)`; `0.0` is
    /// a sentinel meaning "one cluster, never skip".
    pub cluster_ratio: f32,
    /// Minimum posting size before clustering kicks in at all.
    pub approximate_threshold: u32,
}

impl Default for SeismicConfig {
    fn default() -> Self {
        Self {
            n_postings: 1000,
            summary_prune_ratio: 0.4,
            cluster_ratio: 0.1,
            approximate_threshold: MINIMAL_DOC_SIZE_TO_CLUSTER as u32,
        }
    }
}

/// A group of documents produced by clustering one term's posting list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentCluster {
    /// Pruned max-pooled summary of member vectors; `None` while the
    /// cluster is a threshold-guard single-cluster with no summary built.
    pub summary: Option<SparseVector>,
    /// Ascending by `doc_id`, parallel to `weights`.
    doc_ids: Vec<i32>,
    weights: Vec<u8>,
    /// If true, the query engine must evaluate every member regardless of
    /// the summary score (tiny or unclustered postings).
    pub should_not_skip: bool,
}

impl DocumentCluster {
    fn from_members(mut members: Vec<DocWeight>, summary: Option<SparseVector>, should_not_skip: bool) -> Self {
        members.sort_by_key(|m| m.doc_id);
        let (doc_ids, weights) = members.into_iter().map(|m| (m.doc_id, m.weight)).unzip();
        Self {
            summary,
            doc_ids,
            weights,
            should_not_skip,
        }
    }

    pub fn doc_ids(&self) -> &[i32] {
        &self.doc_ids
    }

    pub fn weights(&self) -> &[u8] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// Shallow struct + parallel arrays + summary vector size, in bytes.
    pub fn ram_bytes(&self) -> usize {
        let arrays = self.doc_ids.len() * std::mem::size_of::<i32>() + self.weights.len();
        let summary = self.summary.as_ref().map(SparseVector::ram_bytes).unwrap_or(0);
        arrays + summary
    }
}

/// The clusters associated with one term.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostingClusters {
    clusters: Vec<DocumentCluster>,
}

impl PostingClusters {
    pub fn new(clusters: Vec<DocumentCluster>) -> Self {
        Self { clusters }
    }

    pub fn clusters(&self) -> &[DocumentCluster] {
        &self.clusters
    }

    /// Sum of member counts across all clusters.
    pub fn size(&self) -> usize {
        self.clusters.iter().map(DocumentCluster::len).sum()
    }

    pub fn ram_bytes(&self) -> usize {
        self.clusters.iter().map(DocumentCluster::ram_bytes).sum()
    }
}

/// Min-heap entry ordered by weight ascending, so popping the smallest is
/// O(log K); ties broken by arbitrary heap order (doc_id as a tiebreak key
/// only for a deterministic `Ord` impl, not semantic order).
#[derive(Eq, PartialEq)]
struct HeapEntry(DocWeight);

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse so BinaryHeap (a max-heap) behaves as a min-heap on weight.
        other.0.weight.cmp(&self.0.weight).then(other.0.doc_id.cmp(&self.0.doc_id))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

fn top_k_prune(postings: &[DocWeight], k: usize) -> Vec<DocWeight> {
    let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(k + 1);
    for &dw in postings {
        heap.push(HeapEntry(dw));
        if heap.len() > k {
            heap.pop();
        }
    }
    heap.into_iter().map(|e| e.0).collect()
}

/// Top-K prune `postings`, then randomly partition and summarise into
/// clusters per `config`.
pub fn cluster(
    postings: &[DocWeight],
    config: &SeismicConfig,
    reader: &dyn SparseVectorReader,
) -> Vec<DocumentCluster> {
    if postings.len() < config.approximate_threshold as usize {
        if postings.is_empty() {
            return Vec::new();
        }
        return vec![DocumentCluster::from_members(postings.to_vec(), None, true)];
    }

    if config.n_postings == 0 {
        return Vec::new();
    }

    let pruned = if config.n_postings as usize >= postings.len() {
        postings.to_vec()
    } else {
        top_k_prune(postings, config.n_postings as usize)
    };

    if pruned.len() < MINIMAL_DOC_SIZE_TO_CLUSTER {
        return vec![DocumentCluster::from_members(pruned, None, true)];
    }

    if config.cluster_ratio == 0.0 {
        let members_with_vectors: Vec<(DocWeight, SparseVector)> = pruned
            .iter()
            .filter_map(|&dw| reader.read(dw.doc_id).map(|v| (dw, v)))
            .collect();
        let summary = summarize(members_with_vectors.iter().map(|(_, v)| v), config.summary_prune_ratio);
        return vec![DocumentCluster::from_members(pruned, Some(summary), true)];
    }

    random_cluster_and_summarize(pruned, config, reader)
}

fn random_cluster_and_summarize(
    pruned: Vec<DocWeight>,
    config: &SeismicConfig,
    reader: &dyn SparseVectorReader,
) -> Vec<DocumentCluster> {
    let size = pruned.len();
    let m = ((size as f32 * config.cluster_ratio).ceil() as usize).clamp(1, size);

    let mut indices: Vec<usize> = (0..size).collect();
    fastrand::shuffle(&mut indices);
    let centre_indices = &indices[..m];

    let centres: Vec<SparseVector> = centre_indices
        .iter()
        .map(|&i| reader.read(pruned[i].doc_id).unwrap_or_else(SparseVector::empty))
        .collect();

    // members[c] accumulates (DocWeight, SparseVector) assigned to centre c
    let mut members: Vec<Vec<(DocWeight, SparseVector)>> = (0..m).map(|_| Vec::new()).collect();

    for &dw in &pruned {
        let Some(vector) = reader.read(dw.doc_id) else {
            continue;
        };
        let dense = vector.to_dense(0);
        let mut best_idx = 0usize;
        let mut best_score: i64 = -1;
        for (idx, centre) in centres.iter().enumerate() {
            let score = i64::from(centre.dot_dense(&dense));
            if score > best_score {
                best_score = score;
                best_idx = idx;
            }
        }
        members[best_idx].push((dw, vector));
    }

    members
        .into_iter()
        .filter(|group| !group.is_empty())
        .map(|group| {
            let summary = summarize(group.iter().map(|(_, v)| v), config.summary_prune_ratio);
            let doc_weights: Vec<DocWeight> = group.into_iter().map(|(dw, _)| dw).collect();
            DocumentCluster::from_members(doc_weights, Some(summary), false)
        })
        .collect()
}

/// Max-pool member token weights, then retain the smallest weight-descending
/// prefix whose cumulative weight strictly exceeds `floor(total * ratio)`.
fn summarize<'a>(members: impl Iterator<Item = &'a SparseVector>, prune_ratio: f32) -> SparseVector {
    let mut maxpool: HashMap<u32, u8> = HashMap::new();
    for member in members {
        for (token, weight) in member.iter() {
            maxpool
                .entry(token)
                .and_modify(|w| *w = (*w).max(weight))
                .or_insert(weight);
        }
    }

    let mut items: Vec<(u32, u8)> = maxpool.into_iter().collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let total: u32 = items.iter().map(|(_, w)| u32::from(*w)).sum();
    let threshold = (total as f32 * prune_ratio).floor() as u32;

    let mut retained = Vec::new();
    let mut cumulative: u32 = 0;
    for (token, weight) in items {
        cumulative += u32::from(weight);
        retained.push((token, weight));
        if cumulative > threshold {
            break;
        }
    }

    retained.sort_by_key(|(token, _)| *token);
    let (tokens, weights) = retained.into_iter().unzip();
    // Construction cannot fail: tokens are deduped keys of a HashMap, now
    // sorted ascending.
    SparseVector::new(tokens, weights).unwrap_or_else(|_| SparseVector::empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seismic::reader::MapSparseVectorReader;

    fn postings(n: usize) -> Vec<DocWeight> {
        (0..n as i32).map(|i| DocWeight::new(i, ((i % 250) + 1) as u8)).collect()
    }

    #[test]
    fn tiny_posting_below_approximate_threshold_is_one_unskippable_cluster() {
        let config = SeismicConfig {
            n_postings: 1000,
            summary_prune_ratio: 0.4,
            cluster_ratio: 0.1,
            approximate_threshold: 10,
        };
        let reader = MapSparseVectorReader::new();
        let clusters = cluster(&postings(5), &config, &reader);
        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].should_not_skip);
        assert!(clusters[0].summary.is_none());
        assert_eq!(clusters[0].len(), 5);
    }

    #[test]
    fn zero_n_postings_yields_empty_result() {
        let config = SeismicConfig {
            n_postings: 0,
            ..SeismicConfig::default()
        };
        let reader = MapSparseVectorReader::new();
        let clusters = cluster(&postings(50), &config, &reader);
        assert!(clusters.is_empty());
    }

    #[test]
    fn top_k_prune_caps_total_members_at_n_postings() {
        let config = SeismicConfig {
            n_postings: 20,
            summary_prune_ratio: 0.4,
            cluster_ratio: 0.2,
            approximate_threshold: 10,
        };
        let mut reader = MapSparseVectorReader::new();
        for dw in postings(100) {
            reader.insert(dw.doc_id, SparseVector::new(vec![0], vec![dw.weight]).unwrap());
        }
        let clusters = cluster(&postings(100), &config, &reader);
        let total: usize = clusters.iter().map(DocumentCluster::len).sum();
        assert!(total <= 20);
    }

    #[test]
    fn below_minimal_cluster_size_after_prune_is_unskippable_with_no_summary() {
        let config = SeismicConfig {
            n_postings: 5,
            summary_prune_ratio: 0.4,
            cluster_ratio: 0.2,
            approximate_threshold: 10,
        };
        let reader = MapSparseVectorReader::new();
        let clusters = cluster(&postings(50), &config, &reader);
        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].should_not_skip);
        assert!(clusters[0].summary.is_none());
        assert_eq!(clusters[0].len(), 5);
    }

    #[test]
    fn every_cluster_doc_ids_strictly_ascending_and_equal_length_to_weights() {
        let config = SeismicConfig {
            n_postings: 100,
            summary_prune_ratio: 0.4,
            cluster_ratio: 0.3,
            approximate_threshold: 10,
        };
        let mut reader = MapSparseVectorReader::new();
        for dw in postings(100) {
            reader.insert(
                dw.doc_id,
                SparseVector::new(vec![(dw.doc_id % 10) as u32], vec![dw.weight]).unwrap(),
            );
        }
        let clusters = cluster(&postings(100), &config, &reader);
        for c in &clusters {
            assert_eq!(c.doc_ids().len(), c.weights().len());
            assert!(c.doc_ids().windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn summary_tokens_are_max_over_members() {
        let members = [
            SparseVector::new(vec![1, 2], vec![100, 20]).unwrap(),
            SparseVector::new(vec![1, 3], vec![60, 10]).unwrap(),
        ];
        let summary = summarize(members.iter(), 0.5);
        // max-pooled: token1 -> 100, token2 -> 20, token3 -> 10; sum=130, threshold=65
        // sorted desc: (1,100) cumulative 100 > 65 -> retain only token 1
        assert_eq!(summary.tokens(), &[1]);
        assert_eq!(summary.weights(), &[100]);
    }

    #[test]
    fn summary_pruning_at_ratio_half_retains_only_the_dominant_token() {
        let members = [
            SparseVector::new(vec![0, 1], vec![100, 60]).unwrap(),
            SparseVector::new(vec![2, 3], vec![20, 10]).unwrap(),
        ];
        let summary = summarize(members.iter(), 0.5);
        assert_eq!(summary.tokens(), &[0]);
        assert_eq!(summary.weights(), &[100]);
    }

    #[test]
    fn summary_ratio_one_retains_every_item() {
        let members = [SparseVector::new(vec![0, 1, 2], vec![10, 20, 30]).unwrap()];
        let summary = summarize(members.iter(), 1.0);
        assert_eq!(summary.nnz(), 3);
    }
}
