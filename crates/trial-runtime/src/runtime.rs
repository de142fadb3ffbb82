//! Single-threaded runtime bridge
//!
//! Suites, tests and reports are `Rc` handles, so a run is a `!Send` future.
//! `block_on` drives such a future on a lazily built current-thread tokio
//! runtime inside a `LocalSet`, which also lets test bodies `spawn_local`.

use std::future::Future;
use std::sync::OnceLock;
use tokio::runtime::Runtime;
use tokio::task::LocalSet;

static TOKIO_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Get a reference to the shared tokio runtime
///
/// Initializes the runtime if it hasn't been initialized yet.
///
/// # Panics
/// Panics if the runtime fails to initialize
pub fn runtime() -> &'static Runtime {
    TOKIO_RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to initialize tokio runtime")
    })
}

/// Block the current thread until `future` completes
///
/// Must not be called from inside another tokio runtime.
pub fn block_on<F: Future>(future: F) -> F::Output {
    let local = LocalSet::new();
    local.block_on(runtime(), future)
}
