//! Clustering worker pool
//!
//! A named, once-initialised, process-wide thread pool for running
//! per-term clustering off the merge thread. `init`/`shutdown` are
//! explicit rather than lazy so callers (and tests) can pin a
//! deterministic thread count instead of inheriting `num_cpus::get()`.
//! Cancellation is cooperative: a [`CancellationToken`] is checked between
//! terms, never mid-term, so in-flight work always finishes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use crossbeam::atomic::AtomicCell;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error, info};

use crate::error::{MergeError, Result};
use crate::seismic::cluster::{cluster, DocumentCluster, SeismicConfig};
use crate::seismic::reader::SparseVectorReader;
use crate::seismic::vector::DocWeight;

static CLUSTERING_POOL: OnceCell<Mutex<Option<Arc<ThreadPool>>>> = OnceCell::new();

fn pool_cell() -> &'static Mutex<Option<Arc<ThreadPool>>> {
    CLUSTERING_POOL.get_or_init(|| Mutex::new(None))
}

/// Submitted/completed/failed counters scoped to clustering batch tasks.
#[derive(Debug, Default)]
pub struct ClusteringPoolStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl ClusteringPoolStats {
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

static STATS: ClusteringPoolStats = ClusteringPoolStats {
    submitted: AtomicU64::new(0),
    completed: AtomicU64::new(0),
    failed: AtomicU64::new(0),
};

pub fn stats() -> &'static ClusteringPoolStats {
    &STATS
}

/// A cooperative cancellation flag shared between a caller and an
/// in-flight [`BatchClusteringTask`]. Checked between terms only; cloning
/// shares the same underlying flag.
#[derive(Debug, Clone)]
pub struct CancellationToken(Arc<AtomicCell<bool>>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicCell::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

fn build_pool(thread_count: usize) -> anyhow::Result<Arc<ThreadPool>> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count.max(1))
        .thread_name(|i| format!("seismic-cluster-{i}"))
        .build()
        .context("failed to build clustering thread pool")?;
    Ok(Arc::new(pool))
}

/// Explicit, non-lazy init — call once from the controller thread that
/// owns segment-merge scheduling. A no-op if already initialized.
pub fn init(thread_count: usize) -> anyhow::Result<()> {
    let mut guard = pool_cell().lock();
    if guard.is_none() {
        *guard = Some(build_pool(thread_count)?);
        info!(thread_count, "initialized clustering worker pool");
    }
    Ok(())
}

/// Change the pool size; only meant to be called from the controller
/// thread that owns segment-merge scheduling.
pub fn set_size(thread_count: usize) -> anyhow::Result<()> {
    let mut guard = pool_cell().lock();
    *guard = Some(build_pool(thread_count)?);
    Ok(())
}

/// Tears down the pool. A later `submit`/`execute` call lazily rebuilds
/// one sized to `num_cpus::get()`, same as if `init` had never been called.
pub fn shutdown() {
    let mut guard = pool_cell().lock();
    if guard.take().is_some() {
        info!("shut down clustering worker pool");
    }
}

fn clustering_pool() -> Result<Arc<ThreadPool>> {
    let mut guard = pool_cell().lock();
    if guard.is_none() {
        let pool = build_pool(num_cpus::get()).map_err(|e| MergeError::Other(e.to_string()))?;
        *guard = Some(pool);
    }
    match guard.as_ref() {
        Some(pool) => Ok(Arc::clone(pool)),
        None => unreachable!("pool initialized above"),
    }
}

/// Processes a batch of terms end-to-end: reads each term's merged
/// postings, runs the clustering driver, and returns `(term, clusters)`
/// pairs for the caller to write into the posting store.
pub struct BatchClusteringTask<'a> {
    pub postings_by_term: Vec<(Vec<u8>, Vec<DocWeight>)>,
    pub config: SeismicConfig,
    pub reader: &'a (dyn SparseVectorReader + Sync),
}

impl<'a> BatchClusteringTask<'a> {
    /// Runs synchronously on the calling thread, to completion; use
    /// [`submit_cancellable`] to run on the clustering pool with
    /// cooperative cancellation instead.
    pub fn run(&self) -> Result<Vec<(Vec<u8>, Vec<DocumentCluster>)>> {
        self.run_with_cancel(&CancellationToken::new())
    }

    /// Same as [`Self::run`], but checks `cancel` before starting each
    /// term and stops early (returning what completed so far) once it's
    /// set. The term in progress when cancellation is observed always
    /// finishes — cancellation never aborts mid-term.
    pub fn run_with_cancel(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<(Vec<u8>, Vec<DocumentCluster>)>> {
        let mut out = Vec::with_capacity(self.postings_by_term.len());
        for (term, postings) in &self.postings_by_term {
            if cancel.is_cancelled() {
                debug!(
                    completed = out.len(),
                    total = self.postings_by_term.len(),
                    "clustering batch cancelled before next term"
                );
                break;
            }
            let clusters = cluster(postings, &self.config, self.reader);
            out.push((term.clone(), clusters));
        }
        Ok(out)
    }
}

/// Submit a batch task onto the clustering pool, blocking the calling
/// thread until it completes and returning its result. Equivalent to
/// [`submit_cancellable`] with a token that's never cancelled.
pub fn submit(task: &BatchClusteringTask<'_>) -> Result<Vec<(Vec<u8>, Vec<DocumentCluster>)>> {
    submit_cancellable(task, &CancellationToken::new())
}

/// Hand `task` to the clustering pool via a scoped spawn, blocking the
/// calling thread until the result arrives over a one-shot channel. This
/// crate stays synchronous and CPU-only; a host embedding it in an async
/// runtime can wrap `submit_cancellable` in `spawn_blocking` rather than
/// this crate exposing a boxed future itself. `cancel` is checked by the
/// task between terms — call `cancel.cancel()` from another thread to
/// stop the batch after its current term finishes.
pub fn submit_cancellable(
    task: &BatchClusteringTask<'_>,
    cancel: &CancellationToken,
) -> Result<Vec<(Vec<u8>, Vec<DocumentCluster>)>> {
    STATS.submitted.fetch_add(1, Ordering::Relaxed);
    let pool = clustering_pool()?;

    let (tx, rx) = crossbeam::channel::bounded(1);
    pool.scope(|s| {
        s.spawn(|_| {
            let _ = tx.send(task.run_with_cancel(cancel));
        });
    });
    let result = rx
        .recv()
        .unwrap_or_else(|_| Err(MergeError::Other("clustering worker disconnected".to_string())));

    match &result {
        Ok(_) => {
            STATS.completed.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            STATS.failed.fetch_add(1, Ordering::Relaxed);
            error!(error = %e, "batch clustering task failed");
        }
    }
    result
}

/// Run a task immediately on the calling thread, bypassing the pool --
/// useful for tests needing a deterministic executor.
pub fn execute(task: &BatchClusteringTask<'_>) -> Result<Vec<(Vec<u8>, Vec<DocumentCluster>)>> {
    debug!(terms = task.postings_by_term.len(), "executing clustering batch inline");
    task.run().map_err(|e| MergeError::Other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seismic::reader::MapSparseVectorReader;

    #[test]
    fn submit_returns_one_entry_per_term() {
        crate::logging::init_test_tracing();
        init(2).unwrap();
        let reader = MapSparseVectorReader::new();
        let task = BatchClusteringTask {
            postings_by_term: vec![
                (b"a".to_vec(), vec![DocWeight::new(0, 3), DocWeight::new(1, 5)]),
                (b"b".to_vec(), vec![DocWeight::new(2, 9)]),
            ],
            config: SeismicConfig::default(),
            reader: &reader,
        };
        let results = submit(&task).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn execute_runs_inline_without_the_pool() {
        let reader = MapSparseVectorReader::new();
        let task = BatchClusteringTask {
            postings_by_term: vec![(b"a".to_vec(), vec![DocWeight::new(0, 3)])],
            config: SeismicConfig::default(),
            reader: &reader,
        };
        let results = execute(&task).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn cancelling_before_submit_stops_before_the_first_term() {
        let reader = MapSparseVectorReader::new();
        let task = BatchClusteringTask {
            postings_by_term: vec![
                (b"a".to_vec(), vec![DocWeight::new(0, 3)]),
                (b"b".to_vec(), vec![DocWeight::new(1, 4)]),
            ],
            config: SeismicConfig::default(),
            reader: &reader,
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let results = submit_cancellable(&task, &cancel).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn uncancelled_token_runs_every_term() {
        let reader = MapSparseVectorReader::new();
        let task = BatchClusteringTask {
            postings_by_term: vec![
                (b"a".to_vec(), vec![DocWeight::new(0, 3)]),
                (b"b".to_vec(), vec![DocWeight::new(1, 4)]),
            ],
            config: SeismicConfig::default(),
            reader: &reader,
        };
        let cancel = CancellationToken::new();
        let results = submit_cancellable(&task, &cancel).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn shutdown_allows_a_later_submit_to_rebuild_the_pool() {
        init(1).unwrap();
        shutdown();
        let reader = MapSparseVectorReader::new();
        let task = BatchClusteringTask {
            postings_by_term: vec![(b"a".to_vec(), vec![DocWeight::new(0, 3)])],
            config: SeismicConfig::default(),
            reader: &reader,
        };
        let results = submit(&task).unwrap();
        assert_eq!(results.len(), 1);
    }
}
