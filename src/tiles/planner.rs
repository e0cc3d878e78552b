//! Per-tick viewport planning: which tiles to request, which to evict.
//!
//! `plan` is a pure cache transformation plus fetch side effects: it drains
//! completed fetches into the pyramid, requests every missing tile in the
//! overscanned visible range, then sweeps out tiles the viewport can no
//! longer use. Callers invoke it once per render tick or viewport change.

use crate::core::address::TileAddress;
use crate::core::bounds::Bounds;
use crate::core::constants::{MAX_ZOOM, TILE_SIZE, TIPPING};
use crate::core::viewport::Viewport;
use crate::tiles::covering;
use crate::tiles::loader::FetchPipeline;
use crate::tiles::pyramid::TilePyramid;

/// Half-open rectangle of tile indices at a single zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub zoom: u8,
    pub imin: u64,
    pub imax: u64,
    pub jmin: u64,
    pub jmax: u64,
}

impl TileRange {
    pub fn is_empty(&self) -> bool {
        self.imin >= self.imax || self.jmin >= self.jmax
    }

    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            (self.imax - self.imin) * (self.jmax - self.jmin)
        }
    }

    pub fn contains(&self, address: TileAddress) -> bool {
        address.zoom == self.zoom
            && (self.imin..self.imax).contains(&address.i)
            && (self.jmin..self.jmax).contains(&address.j)
    }

    pub fn iter(&self) -> impl Iterator<Item = TileAddress> + '_ {
        let zoom = self.zoom;
        let js = self.jmin..self.jmax;
        (self.imin..self.imax)
            .flat_map(move |i| js.clone().map(move |j| TileAddress::new(zoom, i, j)))
    }
}

/// The tile indices the viewport needs at its nearest zoom level, overscanned
/// by one tile column before and three after (and likewise for rows) so that
/// panning has pixels ready before they scroll in.
pub fn tile_range(viewport: &Viewport) -> TileRange {
    let zoom = viewport.nearest_zoom();
    let world = TileAddress::world_size(zoom);
    // Scale from viewport pixels to tile-grid pixels at the snapped level.
    let scale = 2_f64.powf(f64::from(zoom) - viewport.zoom);
    let tile = f64::from(TILE_SIZE);

    let imin = ((-viewport.translate.x * scale / tile).floor() as i64 - 1).max(0) as u64;
    let jmin = ((-viewport.translate.y * scale / tile).floor() as i64).max(0) as u64;
    let across = (viewport.size.x * scale / tile).ceil() as u64 + 3;
    let down = (viewport.size.y * scale / tile).ceil() as u64 + 3;

    TileRange {
        zoom,
        imin,
        imax: (imin + across).min(world),
        jmin,
        jmax: (jmin + down).min(world),
    }
}

/// Screen-space rectangle of a tile under the current viewport. Tiles from a
/// different level than the continuous zoom come out scaled by
/// `2^(viewport.zoom - tile.zoom)`.
pub fn tile_screen_bounds(address: TileAddress, viewport: &Viewport) -> Bounds {
    let scale = 2_f64.powf(viewport.zoom - f64::from(address.zoom));
    let size = f64::from(TILE_SIZE) * scale;
    let x = viewport.translate.x + address.i as f64 * size;
    let y = viewport.translate.y + address.j as f64 * size;
    Bounds::from_coords(x, y, x + size, y + size)
}

/// Whether a resident tile should be drawn this tick: it belongs to the
/// selected level, or it is covering for a descendant, or the zoom is pinned
/// past the deepest level and this is a deepest-level tile.
pub fn is_displayed(pyramid: &TilePyramid, address: TileAddress, viewport: &Viewport) -> bool {
    let visible_window = (viewport.zoom + TIPPING).floor() as i64;
    visible_window == i64::from(address.zoom)
        || pyramid.is_covering(address)
        || (visible_window >= i64::from(MAX_ZOOM) && address.zoom == MAX_ZOOM - 1)
}

/// What one planning cycle did.
#[derive(Debug, Default, Clone)]
pub struct PlanOutcome {
    /// Tiles newly requested from the fetch pipeline.
    pub requested: Vec<TileAddress>,
    /// Tiles whose bytes arrived since the previous cycle.
    pub ready: Vec<TileAddress>,
    /// Tiles removed by the eviction sweep or under memory pressure.
    pub evicted: Vec<TileAddress>,
}

/// Run one planning cycle against the current viewport.
pub fn plan(
    pyramid: &mut TilePyramid,
    pipeline: &FetchPipeline,
    viewport: &Viewport,
) -> PlanOutcome {
    let mut ready = Vec::new();
    for completion in pipeline.drain_results() {
        if pyramid.apply_result(completion.address, completion.result) {
            ready.push(completion.address);
        }
    }

    let mut requested = Vec::new();
    for address in tile_range(viewport).iter() {
        if pyramid.lookup_or_create(address) {
            if let Some(ancestor) = covering::find_covering(pyramid, address) {
                pyramid.mark_covering(ancestor, address);
            }
            pipeline.request(address);
            requested.push(address);
        }
    }

    let mut evicted = sweep(pyramid, viewport);
    evicted.extend(pyramid.evict_under_pressure());

    PlanOutcome {
        requested,
        ready,
        evicted,
    }
}

/// Remove tiles the viewport can no longer use:
///
/// * finer than the ceiling of the continuous zoom, unconditionally;
/// * coarser than the selected level, unless covering (and never when the
///   zoom is pinned at the deepest level, where every tile is coarser);
/// * outside the viewport, unless still loading or covering.
pub fn sweep(pyramid: &mut TilePyramid, viewport: &Viewport) -> Vec<TileAddress> {
    let screen = Bounds::from_coords(0.0, 0.0, viewport.size.x, viewport.size.y);
    let selected = (viewport.zoom + TIPPING).floor();
    let ceiling = viewport.zoom.ceil();
    let pinned_at_max = ceiling >= f64::from(MAX_ZOOM);

    let mut victims = Vec::new();
    for entry in pyramid.entries() {
        let address = entry.address;
        let level = f64::from(address.zoom);
        let covering = entry.is_covering();

        let too_detailed = level > ceiling;
        let too_coarse = level < selected && !covering && !pinned_at_max;
        let off_screen = !tile_screen_bounds(address, viewport).intersects(&screen)
            && !entry.is_loading()
            && !covering;

        if too_detailed || too_coarse || off_screen {
            victims.push(address);
        }
    }
    for address in &victims {
        pyramid.remove(*address);
    }
    victims
}
