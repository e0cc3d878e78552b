//! Asynchronous tile fetch pipeline.
//!
//! A fetch walks memory cache, disk cache, then the network, with concurrent
//! requests for the same address deduplicated onto one shared future and
//! network traffic bounded by a semaphore. Completions are pushed onto a
//! channel the planning thread drains on its next cycle; once issued, a fetch
//! always runs to completion even if the tile has been evicted meanwhile.

use crate::core::address::TileAddress;
use crate::core::constants::{
    DEFAULT_FETCH_CONCURRENCY, DEFAULT_FETCH_TIMEOUT, DEFAULT_MEMORY_CACHE_TILES,
};
use crate::prelude::{Arc, Duration, HashMap};
use crate::runtime;
use crate::tiles::disk::DiskCache;
use crate::tiles::source::TileRetriever;
use crate::MapError;
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::future::{FutureExt, Shared};
use lru::LruCache;
use std::future::Future;
use std::num::NonZeroUsize;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

/// Tile bytes are shared between the pyramid, the memory cache and any
/// deduplicated waiters.
pub type TileBytes = Arc<Vec<u8>>;

/// Outcome of a single fetch. The error is reference counted so every waiter
/// on a deduplicated fetch can receive it.
pub type FetchResult = std::result::Result<TileBytes, Arc<MapError>>;

/// A completed fetch, delivered through [`FetchPipeline::drain_results`].
#[derive(Debug, Clone)]
pub struct TileResult {
    pub address: TileAddress,
    pub result: FetchResult,
}

/// Tuning knobs for the pipeline.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum tiles downloading concurrently.
    pub max_concurrent: usize,
    /// Connect/read timeout per request.
    pub timeout: Duration,
    /// Appended to the default User-Agent so deployments identify themselves.
    pub user_agent_suffix: Option<String>,
    /// Capacity of the in-memory bytes cache in front of the disk cache.
    pub memory_cache_tiles: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_FETCH_CONCURRENCY,
            timeout: DEFAULT_FETCH_TIMEOUT,
            user_agent_suffix: None,
            memory_cache_tiles: DEFAULT_MEMORY_CACHE_TILES,
        }
    }
}

impl FetchConfig {
    /// Short timeouts and wide concurrency, suited to mock retrievers.
    pub fn for_testing() -> Self {
        Self {
            max_concurrent: 4,
            timeout: Duration::from_secs(1),
            user_agent_suffix: None,
            memory_cache_tiles: 64,
        }
    }
}

type SharedFetch = Shared<Pin<Box<dyn Future<Output = FetchResult> + Send>>>;

struct Inner {
    retriever: Arc<dyn TileRetriever>,
    disk: Option<DiskCache>,
    memory: Mutex<LruCache<TileAddress, TileBytes>>,
    in_flight: Mutex<HashMap<TileAddress, SharedFetch>>,
    semaphore: Arc<Semaphore>,
    result_tx: Sender<TileResult>,
    result_rx: Receiver<TileResult>,
}

/// Cheaply cloneable handle to the fetch machinery. Clones share caches,
/// dedup state and the completion channel.
#[derive(Clone)]
pub struct FetchPipeline {
    inner: Arc<Inner>,
}

impl FetchPipeline {
    pub fn new(
        retriever: Arc<dyn TileRetriever>,
        disk: Option<DiskCache>,
        config: FetchConfig,
    ) -> Self {
        let (result_tx, result_rx) = unbounded();
        let capacity =
            NonZeroUsize::new(config.memory_cache_tiles.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Inner {
                retriever,
                disk,
                memory: Mutex::new(LruCache::new(capacity)),
                in_flight: Mutex::new(HashMap::default()),
                semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
                result_tx,
                result_rx,
            }),
        }
    }

    /// Fire-and-forget fetch; the outcome arrives via `drain_results`.
    pub fn request(&self, address: TileAddress) {
        let pipeline = self.clone();
        let tx = self.inner.result_tx.clone();
        runtime::spawn(async move {
            let result = pipeline.fetch(address).await;
            // The receiver lives as long as the pipeline, but the map may be
            // dropped while fetches are still in flight.
            let _ = tx.send(TileResult { address, result });
        });
    }

    /// Fetch tile bytes, deduplicating against any identical fetch already in
    /// flight.
    pub async fn fetch(&self, address: TileAddress) -> FetchResult {
        if let Some(bytes) = self.cached(address) {
            return Ok(bytes);
        }
        self.in_flight_or_start(address).await
    }

    /// Memory-cache lookup only; never touches disk or network.
    pub fn cached(&self, address: TileAddress) -> Option<TileBytes> {
        lock(&self.inner.memory).get(&address).cloned()
    }

    /// Completions since the last drain, in arrival order.
    pub fn drain_results(&self) -> Vec<TileResult> {
        let mut results = Vec::new();
        while let Ok(result) = self.inner.result_rx.try_recv() {
            results.push(result);
        }
        results
    }

    /// Number of fetches currently in flight (including queued behind the
    /// concurrency limit).
    pub fn in_flight_count(&self) -> usize {
        lock(&self.inner.in_flight).len()
    }

    fn in_flight_or_start(&self, address: TileAddress) -> SharedFetch {
        let mut in_flight = lock(&self.inner.in_flight);
        if let Some(existing) = in_flight.get(&address) {
            log::debug!("joining in-flight fetch for {}", address);
            return existing.clone();
        }
        let pipeline = self.clone();
        let future: Pin<Box<dyn Future<Output = FetchResult> + Send>> = Box::pin(async move {
            let result = pipeline.load(address).await;
            lock(&pipeline.inner.in_flight).remove(&address);
            result
        });
        let shared = future.shared();
        in_flight.insert(address, shared.clone());
        shared
    }

    async fn load(&self, address: TileAddress) -> FetchResult {
        if let Some(disk) = &self.inner.disk {
            if let Some(bytes) = disk.read(address) {
                log::debug!("disk cache hit for {}", address);
                let bytes = Arc::new(bytes);
                self.remember(address, bytes.clone());
                return Ok(bytes);
            }
        }
        // The semaphore is never closed, so acquisition only fails if the
        // process is tearing down; proceeding unbounded then is harmless.
        let _permit = self.inner.semaphore.clone().acquire_owned().await.ok();
        match self.inner.retriever.load_tile(address).await {
            Ok(bytes) => {
                if let Some(disk) = &self.inner.disk {
                    if let Err(error) = disk.write(address, &bytes) {
                        // A failed cache write must not fail the fetch.
                        log::warn!("could not persist tile {}: {}", address, error);
                    }
                }
                let bytes = Arc::new(bytes);
                self.remember(address, bytes.clone());
                Ok(bytes)
            }
            Err(error) => {
                log::error!("fetch of tile {} failed: {}", address, error);
                Err(Arc::new(error))
            }
        }
    }

    fn remember(&self, address: TileAddress, bytes: TileBytes) {
        lock(&self.inner.memory).put(address, bytes);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = FetchConfig::default();
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.memory_cache_tiles, 512);
        assert!(config.user_agent_suffix.is_none());
    }
}
