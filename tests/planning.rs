//! Planning cycles through the `Map` facade: request/ready/evict lifecycles
//! across pans, zooms and fetch failures.

use async_trait::async_trait;
use slipmap::{DiskCache, Map, MapError, TileAddress, TileRetriever, TileState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct MockRetriever {
    calls: AtomicUsize,
    fail: bool,
}

impl MockRetriever {
    fn instant() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
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
        if self.fail {
            Err(MapError::Decode(format!("no data for {address}")))
        } else {
            Ok(format!("{address}").into_bytes())
        }
    }
}

fn map_with(retriever: Arc<MockRetriever>) -> Map {
    let _ = env_logger::builder().is_test(true).try_init();
    Map::builder()
        .center(50.85, 4.35)
        .zoom(11.0)
        .size(800.0, 600.0)
        .retriever(retriever)
        .without_disk_cache()
        .build()
        .unwrap()
}

/// Plan repeatedly until `count` tiles have turned ready, or panic after a
/// couple of seconds.
fn plan_until_ready(map: &mut Map, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut ready = 0;
    while ready < count {
        assert!(
            Instant::now() < deadline,
            "only {ready} of {count} tiles became ready"
        );
        ready += map.plan().ready.len();
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn first_plan_requests_the_overscanned_range() {
    let mut map = map_with(MockRetriever::instant());
    let outcome = map.plan();

    // 800x600 at an integer zoom needs 4x3 tiles; overscan pads to 7x6.
    assert_eq!(outcome.requested.len(), 42);
    assert!(outcome.ready.is_empty());
    for addr in &outcome.requested {
        assert_eq!(addr.zoom, 11);
        assert!(map.tile_state(*addr).is_some());
    }

    // Planning again right away requests nothing new.
    assert!(map.plan().requested.is_empty());
}

#[test]
fn requested_tiles_become_ready_and_displayed() {
    let retriever = MockRetriever::instant();
    let mut map = map_with(retriever.clone());
    let requested = map.plan().requested;
    plan_until_ready(&mut map, requested.len());

    assert_eq!(retriever.calls(), requested.len());
    for addr in &requested {
        assert_eq!(map.tile_state(*addr), Some(TileState::Ready));
        assert_eq!(
            *map.tile_bytes(*addr).unwrap(),
            format!("{addr}").into_bytes()
        );
        assert!(map.is_displayed(*addr));
        // Same-level tiles draw unscaled.
        assert!((map.tile_screen_bounds(*addr).width() - 256.0).abs() < 1e-9);
    }
}

#[test]
fn panning_far_away_evicts_ready_tiles() {
    let mut map = map_with(MockRetriever::instant());
    let requested = map.plan().requested;
    plan_until_ready(&mut map, requested.len());

    // Brussels to Paris is thousands of pixels at this zoom.
    map.set_center(48.85, 2.35);
    let outcome = map.plan();
    assert!(!outcome.requested.is_empty());
    assert!(!outcome.evicted.is_empty());
    assert!(outcome.evicted.iter().all(|a| requested.contains(a)));
}

#[test]
fn zooming_in_covers_with_ready_ancestors_then_retires_them() {
    let mut map = map_with(MockRetriever::instant());
    let coarse = map.plan().requested;
    plan_until_ready(&mut map, coarse.len());

    map.set_zoom(12.0);
    let outcome = map.plan();
    assert!(!outcome.requested.is_empty());
    // Fresh fine tiles are stood in for by their ready parents.
    assert!(outcome
        .requested
        .iter()
        .any(|addr| map.pyramid().is_covering(addr.parent().unwrap())));
    // Coarse tiles not covering anything are swept immediately.
    assert!(outcome.evicted.iter().any(|a| a.zoom == 11));

    plan_until_ready(&mut map, outcome.requested.len());
    map.plan();
    // Once the fine level is resident nothing coarse survives.
    assert!(map.pyramid().entries().all(|e| e.address.zoom == 12));
}

#[test]
fn failed_tiles_are_kept_and_not_retried() {
    let retriever = MockRetriever::failing();
    let mut map = map_with(retriever.clone());
    let requested = map.plan().requested;

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let outcome = map.plan();
        assert!(outcome.ready.is_empty());
        if requested
            .iter()
            .all(|a| map.tile_state(*a) == Some(TileState::Failed))
        {
            break;
        }
        assert!(Instant::now() < deadline, "tiles never settled as failed");
        std::thread::sleep(Duration::from_millis(10));
    }

    let calls = retriever.calls();
    assert_eq!(calls, requested.len());
    // Failed entries stay resident; planning again does not re-request them.
    let again = map.plan();
    assert!(again.requested.is_empty());
    assert_eq!(retriever.calls(), calls);
}

#[test]
fn disk_cache_feeds_a_second_map() {
    let dir = tempfile::tempdir().unwrap();

    let first = MockRetriever::instant();
    let mut map = Map::builder()
        .center(50.85, 4.35)
        .zoom(11.0)
        .size(800.0, 600.0)
        .retriever(first.clone())
        .disk_cache(DiskCache::new(dir.path()).unwrap())
        .build()
        .unwrap();
    let requested = map.plan().requested;
    plan_until_ready(&mut map, requested.len());
    assert_eq!(first.calls(), requested.len());

    let second = MockRetriever::instant();
    let mut revisit = Map::builder()
        .center(50.85, 4.35)
        .zoom(11.0)
        .size(800.0, 600.0)
        .retriever(second.clone())
        .disk_cache(DiskCache::new(dir.path()).unwrap())
        .build()
        .unwrap();
    let revisited = revisit.plan().requested;
    plan_until_ready(&mut revisit, revisited.len());
    assert_eq!(second.calls(), 0);
}
