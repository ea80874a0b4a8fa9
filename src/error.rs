//! Error types for the hybrid-search merger and SEISMIC core

use thiserror::Error;

/// Main error type for merge/SEISMIC operations
#[derive(Error, Debug)]
pub enum MergeError {
    /// A combination-technique or SEISMIC config option failed to parse or
    /// violated its documented range.
    #[error("config error: {0}")]
    Config(String),

    /// A programmer-error invariant was violated (mismatched sub-query
    /// counts, non-ascending doc ids, ...). Fatal to the current request.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// A `SparseVectorReader` failed while resolving a vector during
    /// clustering.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Propagated from the allocator; caller may retry with a smaller
    /// `n_postings` or fewer clusters.
    #[error("out of memory")]
    OutOfMemory,

    /// Other errors not covered above.
    #[error("{0}")]
    Other(String),
}

/// Result type alias for merge/SEISMIC operations
pub type Result<T> = std::result::Result<T, MergeError>;
