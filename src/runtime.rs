//! Tokio runtime plumbing for the fetch workers.
//!
//! Planning happens on the caller's (UI) thread; only tile fetches run async.
//! When the caller already lives inside a tokio runtime we spawn there,
//! otherwise tasks land on a small shared runtime owned by the library so
//! that fetch work never blocks process shutdown.

use once_cell::sync::Lazy;
use std::future::Future;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("slipmap-fetch")
        .enable_all()
        .build()
        .expect("failed to build slipmap fetch runtime")
});

/// Spawn a fetch task on the ambient runtime if there is one, falling back to
/// the library-owned worker runtime.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => handle.spawn(future),
        Err(_) => RUNTIME.spawn(future),
    }
}
