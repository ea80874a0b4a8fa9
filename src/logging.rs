//! Tracing setup for tests and embedding hosts
//!
//! This crate has no binary of its own — the surrounding plugin owns the
//! process-wide subscriber. [`init_test_tracing`] gives tests (and anyone
//! embedding this crate who wants a quick default) a stderr subscriber
//! without the file-rotation machinery a long-running service needs.

use std::sync::Once;

static INIT: Once = Once::new();

/// Install a stderr `tracing` subscriber once per process, honoring
/// `RUST_LOG`. Safe to call from every test — subsequent calls are no-ops.
pub fn init_test_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "neural_merge_seismic=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}
