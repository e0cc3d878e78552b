//! End-to-end behavior of the fetch pipeline against a mock retriever:
//! deduplication, cache layering, bounded concurrency and error sharing.

use async_trait::async_trait;
use slipmap::{
    DiskCache, FetchConfig, FetchPipeline, MapError, TileAddress, TileRetriever,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Counts invocations; optionally blocks each load on a gate until the test
/// releases it, and optionally fails every load.
struct MockRetriever {
    calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
    fail: bool,
}

impl MockRetriever {
    fn instant() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: None,
            fail: false,
        })
    }

    fn gated(gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: Some(gate),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: None,
            fail: true,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TileRetriever for MockRetriever {
    async fn load_tile(&self, address: TileAddress) -> slipmap::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }
        if self.fail {
            Err(MapError::Decode(format!("no data for {address}")))
        } else {
            Ok(format!("{address}").into_bytes())
        }
    }
}

fn pipeline_with(retriever: Arc<MockRetriever>, disk: Option<DiskCache>) -> FetchPipeline {
    let _ = env_logger::builder().is_test(true).try_init();
    FetchPipeline::new(retriever, disk, FetchConfig::for_testing())
}

#[tokio::test]
async fn concurrent_fetches_for_same_tile_share_one_load() {
    let gate = Arc::new(Semaphore::new(0));
    let retriever = MockRetriever::gated(gate.clone());
    let pipeline = pipeline_with(retriever.clone(), None);
    let addr = TileAddress::new(8, 100, 90);

    let releaser = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        gate.add_permits(1);
    });

    let (first, second) = tokio::join!(pipeline.fetch(addr), pipeline.fetch(addr));
    releaser.await.unwrap();

    assert_eq!(retriever.calls(), 1);
    assert_eq!(*first.unwrap(), *second.unwrap());
    assert_eq!(pipeline.in_flight_count(), 0);
}

#[tokio::test]
async fn completed_fetch_is_served_from_memory() {
    let retriever = MockRetriever::instant();
    let pipeline = pipeline_with(retriever.clone(), None);
    let addr = TileAddress::new(4, 3, 2);

    pipeline.fetch(addr).await.unwrap();
    pipeline.fetch(addr).await.unwrap();
    assert_eq!(retriever.calls(), 1);
    assert!(pipeline.cached(addr).is_some());
}

#[tokio::test]
async fn disk_cache_survives_pipeline_restart() {
    let dir = tempfile::tempdir().unwrap();
    let addr = TileAddress::new(6, 33, 21);

    let first = MockRetriever::instant();
    let pipeline = pipeline_with(first.clone(), Some(DiskCache::new(dir.path()).unwrap()));
    let bytes = pipeline.fetch(addr).await.unwrap();
    assert_eq!(first.calls(), 1);

    // A fresh pipeline (empty memory cache) must satisfy the same address
    // from disk without touching the network.
    let second = MockRetriever::instant();
    let restarted = pipeline_with(second.clone(), Some(DiskCache::new(dir.path()).unwrap()));
    let reloaded = restarted.fetch(addr).await.unwrap();
    assert_eq!(second.calls(), 0);
    assert_eq!(*bytes, *reloaded);
}

#[tokio::test]
async fn failure_is_shared_and_nothing_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let disk = DiskCache::new(dir.path()).unwrap();
    let retriever = MockRetriever::failing();
    let pipeline = pipeline_with(retriever.clone(), Some(disk.clone()));
    let addr = TileAddress::new(5, 1, 1);

    let (first, second) = tokio::join!(pipeline.fetch(addr), pipeline.fetch(addr));
    assert!(first.is_err());
    assert!(second.is_err());
    assert_eq!(retriever.calls(), 1);
    assert!(!disk.contains(addr));
    assert!(pipeline.cached(addr).is_none());
}

#[tokio::test]
async fn disk_write_failure_does_not_fail_the_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let disk = DiskCache::new(dir.path()).unwrap();
    let addr = TileAddress::new(7, 2, 3);
    // Occupy the zoom directory with a plain file so persisting must fail.
    std::fs::write(dir.path().join("7"), b"in the way").unwrap();

    let retriever = MockRetriever::instant();
    let pipeline = pipeline_with(retriever.clone(), Some(disk));
    let bytes = pipeline.fetch(addr).await.unwrap();
    assert_eq!(*bytes, format!("{addr}").into_bytes());
    assert_eq!(retriever.calls(), 1);
}

#[tokio::test]
async fn network_concurrency_is_bounded() {
    let gate = Arc::new(Semaphore::new(0));
    let retriever = MockRetriever::gated(gate.clone());
    let config = FetchConfig {
        max_concurrent: 1,
        ..FetchConfig::for_testing()
    };
    let pipeline = FetchPipeline::new(retriever.clone(), None, config);

    pipeline.request(TileAddress::new(3, 0, 0));
    pipeline.request(TileAddress::new(3, 1, 0));
    tokio::time::sleep(Duration::from_millis(100)).await;
    // Only one load may be past the semaphore while the gate is shut.
    assert_eq!(retriever.calls(), 1);

    gate.add_permits(2);
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    let mut completed = Vec::new();
    while completed.len() < 2 {
        assert!(std::time::Instant::now() < deadline, "fetches never finished");
        completed.extend(pipeline.drain_results());
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(retriever.calls(), 2);
    assert!(completed.iter().all(|r| r.result.is_ok()));
}
