use crate::core::address::TileAddress;
use crate::core::constants::{DEFAULT_LEVEL_CAPACITY, MAX_ZOOM};
use crate::prelude::{HashMap, HashSet, Instant};
use crate::tiles::loader::{FetchResult, TileBytes};

/// Lifecycle of a cached tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    /// Requested, pixels not yet arrived.
    Loading,
    /// Image bytes resident.
    Ready,
    /// Fetch failed; retained and not retried until evicted.
    Failed,
}

/// A single cached tile: state, bytes once ready, and the covering links that
/// keep a coarse tile alive while finer descendants load.
#[derive(Debug)]
pub struct TileEntry {
    pub address: TileAddress,
    state: TileState,
    bytes: Option<TileBytes>,
    covering_for: HashSet<TileAddress>,
    covered_by: Option<TileAddress>,
    touched: Instant,
}

impl TileEntry {
    fn new(address: TileAddress) -> Self {
        Self {
            address,
            state: TileState::Loading,
            bytes: None,
            covering_for: HashSet::default(),
            covered_by: None,
            touched: Instant::now(),
        }
    }

    pub fn state(&self) -> TileState {
        self.state
    }

    pub fn bytes(&self) -> Option<TileBytes> {
        self.bytes.clone()
    }

    /// Whether this tile currently substitutes for one or more descendants
    /// that are still loading (or failed). A covering tile is pinned against
    /// eviction.
    pub fn is_covering(&self) -> bool {
        !self.covering_for.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.state == TileState::Loading
    }
}

/// One tile cache per zoom level, keyed by `TileAddress::cache_key`.
///
/// Mutated only by the planning thread; fetch completions arrive through
/// [`apply_result`](TilePyramid::apply_result) in whatever order the workers
/// finish. Memory pressure is handled explicitly: each level has a soft
/// capacity enforced by
/// [`evict_under_pressure`](TilePyramid::evict_under_pressure).
#[derive(Debug)]
pub struct TilePyramid {
    levels: Vec<HashMap<u64, TileEntry>>,
    level_capacity: usize,
}

impl TilePyramid {
    pub fn new() -> Self {
        Self::with_level_capacity(DEFAULT_LEVEL_CAPACITY)
    }

    pub fn with_level_capacity(level_capacity: usize) -> Self {
        Self {
            levels: (0..MAX_ZOOM).map(|_| HashMap::default()).collect(),
            level_capacity: level_capacity.max(1),
        }
    }

    pub fn get(&self, address: TileAddress) -> Option<&TileEntry> {
        self.levels
            .get(usize::from(address.zoom))?
            .get(&address.cache_key())
    }

    fn get_mut(&mut self, address: TileAddress) -> Option<&mut TileEntry> {
        self.levels
            .get_mut(usize::from(address.zoom))?
            .get_mut(&address.cache_key())
    }

    /// Returns the entry for `address`, registering a fresh `Loading` entry
    /// if none is live. `true` means the entry was created and a fetch should
    /// be issued.
    pub fn lookup_or_create(&mut self, address: TileAddress) -> bool {
        if let Some(entry) = self.get_mut(address) {
            entry.touched = Instant::now();
            return false;
        }
        if let Some(level) = self.levels.get_mut(usize::from(address.zoom)) {
            level.insert(address.cache_key(), TileEntry::new(address));
            true
        } else {
            false
        }
    }

    pub fn state_of(&self, address: TileAddress) -> Option<TileState> {
        self.get(address).map(TileEntry::state)
    }

    pub fn bytes_of(&self, address: TileAddress) -> Option<TileBytes> {
        self.get(address).and_then(TileEntry::bytes)
    }

    pub fn is_covering(&self, address: TileAddress) -> bool {
        self.get(address).map(TileEntry::is_covering).unwrap_or(false)
    }

    /// Record that `ancestor` is rendered in place of `child` until the child
    /// resolves.
    pub fn mark_covering(&mut self, ancestor: TileAddress, child: TileAddress) {
        if ancestor.zoom >= child.zoom {
            return;
        }
        match self.get_mut(ancestor) {
            Some(entry) => {
                entry.covering_for.insert(child);
            }
            None => return,
        }
        if let Some(entry) = self.get_mut(child) {
            if let Some(previous) = entry.covered_by.replace(ancestor) {
                if previous != ancestor {
                    self.unlink_covering(previous, child);
                }
            }
        }
    }

    fn unlink_covering(&mut self, ancestor: TileAddress, child: TileAddress) {
        if let Some(entry) = self.get_mut(ancestor) {
            entry.covering_for.remove(&child);
        }
    }

    /// Apply a fetch completion. Arrivals may be out of order and may refer
    /// to tiles already evicted; those are ignored. Returns `true` when the
    /// tile transitioned to `Ready`.
    ///
    /// On `Ready` the tile is removed from its covering ancestor's set; a
    /// `Failed` tile keeps showing its ancestor, so the link stays.
    pub fn apply_result(&mut self, address: TileAddress, result: FetchResult) -> bool {
        let covered_by = match self.get_mut(address) {
            Some(entry) => match result {
                Ok(bytes) => {
                    entry.state = TileState::Ready;
                    entry.bytes = Some(bytes);
                    entry.touched = Instant::now();
                    entry.covered_by.take()
                }
                Err(error) => {
                    log::warn!("tile {} failed: {}", address, error);
                    entry.state = TileState::Failed;
                    return false;
                }
            },
            None => {
                log::debug!("dropping result for evicted tile {}", address);
                return false;
            }
        };
        if let Some(ancestor) = covered_by {
            self.unlink_covering(ancestor, address);
        }
        true
    }

    /// Remove a tile, detaching any covering links in both directions.
    pub fn remove(&mut self, address: TileAddress) {
        let entry = match self
            .levels
            .get_mut(usize::from(address.zoom))
            .and_then(|level| level.remove(&address.cache_key()))
        {
            Some(entry) => entry,
            None => return,
        };
        if let Some(ancestor) = entry.covered_by {
            self.unlink_covering(ancestor, address);
        }
        for child in entry.covering_for {
            if let Some(child_entry) = self.get_mut(child) {
                child_entry.covered_by = None;
            }
        }
    }

    /// Explicit memory-pressure hook: per level, drop least-recently-touched
    /// entries until the level fits its budget. Loading and covering tiles
    /// are never reclaimed; a reclaimed address is simply absent and will be
    /// re-created on the next lookup.
    pub fn evict_under_pressure(&mut self) -> Vec<TileAddress> {
        let mut evicted = Vec::new();
        for zoom in 0..self.levels.len() {
            while self.levels[zoom].len() > self.level_capacity {
                let victim = self.levels[zoom]
                    .values()
                    .filter(|entry| !entry.is_loading() && !entry.is_covering())
                    .min_by_key(|entry| entry.touched)
                    .map(|entry| entry.address);
                match victim {
                    Some(address) => {
                        self.remove(address);
                        evicted.push(address);
                    }
                    None => break,
                }
            }
        }
        if !evicted.is_empty() {
            log::debug!("pressure eviction reclaimed {} tiles", evicted.len());
        }
        evicted
    }

    /// All resident entries across every level.
    pub fn entries(&self) -> impl Iterator<Item = &TileEntry> {
        self.levels.iter().flat_map(|level| level.values())
    }

    pub fn len(&self) -> usize {
        self.levels.iter().map(|level| level.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Explicit whole-pyramid reset.
    pub fn clear(&mut self) {
        for level in &mut self.levels {
            level.clear();
        }
    }
}

impl Default for TilePyramid {
    fn default() -> Self {
        Self::new()
    }
}
