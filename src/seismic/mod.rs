//! SEISMIC sparse-vector approximate-retrieval core
//!
//! Clusters a term's posting list into summarised groups at merge time so
//! query-time scoring can skip clusters whose summary dot product cannot
//! beat the current top-K threshold.

pub mod cluster;
pub mod posting;
pub mod quantize;
pub mod reader;
pub mod validation;
pub mod vector;
pub mod worker_pool;

pub use cluster::{cluster as cluster_postings, DocumentCluster, PostingClusters, SeismicConfig};
pub use posting::{CacheKey, ClusteredPostingIndex, PostingStoreManager};
pub use quantize::{dequantize, quantize, sim_score, MAX_WEIGHT, SCORE_RESCALE};
pub use reader::{MapSparseVectorReader, SparseVectorReader};
pub use validation::validate as validate_config;
pub use vector::{DocWeight, SparseVector, SparseVectorError};
pub use worker_pool::{
    execute, init, set_size, shutdown, stats, submit, submit_cancellable, BatchClusteringTask,
    CancellationToken, ClusteringPoolStats,
};
