//! Engine-wide constants shared by the projection, planner and fetch code.
//! Keeping them in a single place makes it easier to tweak the magic numbers.

use std::time::Duration;

/// Square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// The maximum zoom level the pyramid supports. Tile addresses live in
/// `[0, MAX_ZOOM)`.
pub const MAX_ZOOM: u8 = 20;

/// When the zoom factor is less than TIPPING below an integer, tile selection
/// already switches to the higher-detail level and scales down. Avoids
/// visible thrashing when the continuous zoom hovers near an integer.
pub const TIPPING: f64 = 0.2;

/// Default raster tile server.
pub const DEFAULT_TILE_HOST: &str = "https://tile.openstreetmap.org";

/// Bounded size of the fetch worker pool.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 2;

/// Connect/read timeout for tile downloads.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-zoom-level entry budget before `evict_under_pressure` kicks in.
pub const DEFAULT_LEVEL_CAPACITY: usize = 256;

/// Default capacity of the in-memory tile bytes cache in front of the disk
/// cache.
pub const DEFAULT_MEMORY_CACHE_TILES: usize = 512;
