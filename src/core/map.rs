//! The embedding-facing facade: one `Map` owns the viewport, the tile
//! pyramid and the fetch pipeline, and exposes a per-tick `plan` call plus
//! the queries a renderer needs to draw whatever is resident.

use crate::core::address::TileAddress;
use crate::core::bounds::Bounds;
use crate::core::constants::{DEFAULT_LEVEL_CAPACITY, MAX_ZOOM};
use crate::core::geo::{LatLng, Point};
use crate::core::viewport::Viewport;
use crate::prelude::Arc;
use crate::tiles::disk::DiskCache;
use crate::tiles::loader::{FetchConfig, FetchPipeline, TileBytes};
use crate::tiles::planner::{self, PlanOutcome};
use crate::tiles::pyramid::{TilePyramid, TileState};
use crate::tiles::source::{HttpTileRetriever, OpenStreetMapSource, TileRetriever};
use crate::Result;

pub struct Map {
    viewport: Viewport,
    pyramid: TilePyramid,
    pipeline: FetchPipeline,
}

impl Map {
    pub fn builder() -> MapBuilder {
        MapBuilder::new()
    }

    /// Run one planning cycle: absorb finished fetches, request the tiles the
    /// viewport needs, evict the ones it no longer can use.
    pub fn plan(&mut self) -> PlanOutcome {
        planner::plan(&mut self.pyramid, &self.pipeline, &self.viewport)
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn pyramid(&self) -> &TilePyramid {
        &self.pyramid
    }

    pub fn set_center(&mut self, lat: f64, lng: f64) {
        self.viewport.set_center(lat, lng);
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.viewport.set_zoom(zoom);
    }

    /// Zoom by `delta` levels keeping the pixel under `(x, y)` stationary.
    pub fn zoom_around(&mut self, delta: f64, x: f64, y: f64) {
        self.viewport.zoom_around(delta, x, y);
    }

    pub fn move_x(&mut self, dx: f64) {
        self.viewport.move_x(dx);
    }

    pub fn move_y(&mut self, dy: f64) {
        self.viewport.move_y(dy);
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.viewport.set_size(width, height);
    }

    /// The geographic coordinate under a viewport pixel.
    pub fn coordinate_at(&self, x: f64, y: f64) -> LatLng {
        self.viewport.coordinate_at(x, y)
    }

    pub fn tile_state(&self, address: TileAddress) -> Option<TileState> {
        self.pyramid.state_of(address)
    }

    pub fn tile_bytes(&self, address: TileAddress) -> Option<TileBytes> {
        self.pyramid.bytes_of(address)
    }

    /// Where on screen a resident tile should be drawn, scaled for the
    /// difference between its level and the continuous zoom.
    pub fn tile_screen_bounds(&self, address: TileAddress) -> Bounds {
        planner::tile_screen_bounds(address, &self.viewport)
    }

    /// Whether a resident tile belongs on screen this tick (selected level,
    /// covering ancestor, or pinned deepest level).
    pub fn is_displayed(&self, address: TileAddress) -> bool {
        planner::is_displayed(&self.pyramid, address, &self.viewport)
    }

    /// Drop every cached tile. In-flight fetches still complete and repopulate
    /// on later plans only if the viewport still wants them.
    pub fn clear(&mut self) {
        self.pyramid.clear();
    }

    /// Reclaim least-recently-used tiles beyond the per-level budget.
    pub fn evict_under_pressure(&mut self) -> Vec<TileAddress> {
        self.pyramid.evict_under_pressure()
    }
}

enum DiskBacking {
    DefaultLocation,
    Disabled,
    At(DiskCache),
}

/// Configures and assembles a [`Map`].
///
/// ```no_run
/// use slipmap::Map;
///
/// let mut map = Map::builder()
///     .center(50.85, 4.35)
///     .zoom(11.0)
///     .size(1024.0, 768.0)
///     .user_agent_suffix("myapp/1.0")
///     .build()
///     .unwrap();
/// let outcome = map.plan();
/// println!("requested {} tiles", outcome.requested.len());
/// ```
pub struct MapBuilder {
    center: LatLng,
    zoom: f64,
    size: Point,
    retriever: Option<Arc<dyn TileRetriever>>,
    disk: DiskBacking,
    fetch_config: FetchConfig,
    level_capacity: usize,
}

impl MapBuilder {
    pub fn new() -> Self {
        Self {
            center: LatLng::default(),
            zoom: 0.0,
            size: Point::new(800.0, 600.0),
            retriever: None,
            disk: DiskBacking::DefaultLocation,
            fetch_config: FetchConfig::default(),
            level_capacity: DEFAULT_LEVEL_CAPACITY,
        }
    }

    pub fn center(mut self, lat: f64, lng: f64) -> Self {
        self.center = LatLng::new(LatLng::clamp_lat(lat), LatLng::wrap_lng(lng));
        self
    }

    pub fn zoom(mut self, zoom: f64) -> Self {
        self.zoom = zoom.clamp(0.0, f64::from(MAX_ZOOM));
        self
    }

    pub fn size(mut self, width: f64, height: f64) -> Self {
        self.size = Point::new(width, height);
        self
    }

    /// Substitute the network layer, e.g. a different tile server scheme or a
    /// mock in tests. Without this an OpenStreetMap HTTP retriever is built.
    pub fn retriever(mut self, retriever: Arc<dyn TileRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn disk_cache(mut self, cache: DiskCache) -> Self {
        self.disk = DiskBacking::At(cache);
        self
    }

    /// Skip the persistent cache entirely; every miss goes to the retriever.
    pub fn without_disk_cache(mut self) -> Self {
        self.disk = DiskBacking::Disabled;
        self
    }

    pub fn fetch_config(mut self, config: FetchConfig) -> Self {
        self.fetch_config = config;
        self
    }

    /// Identify the embedding application in the HTTP User-Agent.
    pub fn user_agent_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.fetch_config.user_agent_suffix = Some(suffix.into());
        self
    }

    /// Per-zoom-level tile budget used by `evict_under_pressure`.
    pub fn level_capacity(mut self, capacity: usize) -> Self {
        self.level_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<Map> {
        let retriever = match self.retriever {
            Some(retriever) => retriever,
            None => Arc::new(HttpTileRetriever::with_options(
                Box::new(OpenStreetMapSource::new()),
                self.fetch_config.timeout,
                self.fetch_config.user_agent_suffix.as_deref(),
            )?),
        };
        let disk = match self.disk {
            DiskBacking::DefaultLocation => Some(DiskCache::at_default_location()?),
            DiskBacking::Disabled => None,
            DiskBacking::At(cache) => Some(cache),
        };
        Ok(Map {
            viewport: Viewport::new(self.center, self.zoom, self.size),
            pyramid: TilePyramid::with_level_capacity(self.level_capacity),
            pipeline: FetchPipeline::new(retriever, disk, self.fetch_config),
        })
    }
}

impl Default for MapBuilder {
    fn default() -> Self {
        Self::new()
    }
}
