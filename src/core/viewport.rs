use crate::core::constants::{MAX_ZOOM, TILE_SIZE, TIPPING};
use crate::core::geo::{self, LatLng, Point};
use serde::{Deserialize, Serialize};

/// The current view of the map: geographic center, continuous zoom, viewport
/// size in pixels and the translation of the world pixel plane relative to
/// the viewport origin.
///
/// `translate` is the source of truth after pans and zooms; `center` is kept
/// in sync so callers can read it back without projecting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub center: LatLng,
    /// Continuous zoom; tile selection snaps it via [`Viewport::nearest_zoom`].
    pub zoom: f64,
    pub size: Point,
    pub translate: Point,
}

impl Viewport {
    /// Creates a new viewport centered on the given coordinate.
    pub fn new(center: LatLng, zoom: f64, size: Point) -> Self {
        let mut viewport = Self {
            center,
            zoom: zoom.clamp(0.0, f64::from(MAX_ZOOM)),
            size,
            translate: Point::default(),
        };
        viewport.recenter();
        viewport
    }

    /// Move the center of the map to the specified coordinates.
    pub fn set_center(&mut self, lat: f64, lng: f64) {
        self.center = LatLng::new(LatLng::clamp_lat(lat), LatLng::wrap_lng(lng));
        self.recenter();
    }

    /// Set the zoom level, clamped to `[0, MAX_ZOOM]`, keeping the current
    /// center fixed.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(0.0, f64::from(MAX_ZOOM));
        self.recenter();
    }

    /// Resize the viewport. The translation is kept, so the geographic center
    /// shifts with the new dimensions.
    pub fn set_size(&mut self, width: f64, height: f64) {
        self.size = Point::new(width, height);
        self.sync_center();
    }

    /// Zoom by `delta` levels around a pivot pixel, keeping the coordinate
    /// under the pivot stationary on screen.
    ///
    /// Zooming out is refused once the world would become smaller than the
    /// viewport height.
    pub fn zoom_around(&mut self, delta: f64, pivot_x: f64, pivot_y: f64) {
        let factor = 1.0 - 2_f64.powf(delta);
        let shift = Point::new(
            (pivot_x - self.translate.x) * factor,
            (pivot_y - self.translate.y) * factor,
        );
        if delta > 0.0 {
            if self.zoom < f64::from(MAX_ZOOM) {
                self.translate = self.translate.add(&shift);
                self.zoom = (self.zoom + delta).min(f64::from(MAX_ZOOM));
                self.sync_center();
            }
        } else if self.zoom > 1.0 {
            let new_zoom = self.zoom + delta;
            if 2_f64.powf(new_zoom) * f64::from(TILE_SIZE) > self.size.y {
                self.translate = self.translate.add(&shift);
                self.zoom = new_zoom;
                self.sync_center();
            } else {
                log::warn!("zoom out refused: world would be smaller than the viewport");
            }
        }
    }

    /// Move the map horizontally by a number of pixels.
    pub fn move_x(&mut self, dx: f64) {
        self.translate.x -= dx;
        self.sync_center();
    }

    /// Move the map vertically by a number of pixels, clamped so the view
    /// never scrolls past the top or bottom edge of the world.
    pub fn move_y(&mut self, dy: f64) {
        let world = f64::from(TILE_SIZE) * 2_f64.powf(self.zoom);
        let max_ty = world - self.size.y;
        if self.translate.y <= 0.0 {
            if self.translate.y + max_ty >= 0.0 {
                self.translate.y = (self.translate.y - dy).min(0.0);
            } else {
                self.translate.y = -max_ty + 1.0;
            }
        } else {
            self.translate.y = 0.0;
        }
        self.sync_center();
    }

    /// The geographic coordinate under a viewport pixel.
    pub fn coordinate_at(&self, x: f64, y: f64) -> LatLng {
        let world_pixel = Point::new(x - self.translate.x, y - self.translate.y);
        geo::pixel_to_geo(&world_pixel, self.zoom)
    }

    /// The viewport pixel position of a geographic coordinate.
    pub fn screen_point(&self, coord: &LatLng) -> Point {
        geo::geo_to_pixel(coord, self.zoom).add(&self.translate)
    }

    /// The integer zoom level tiles are selected at: `floor(zoom + TIPPING)`
    /// clamped to `[0, MAX_ZOOM - 1]`.
    pub fn nearest_zoom(&self) -> u8 {
        (self.zoom + TIPPING)
            .floor()
            .clamp(0.0, f64::from(MAX_ZOOM - 1)) as u8
    }

    /// Recompute the translation so the stored center sits mid-viewport.
    fn recenter(&mut self) {
        let center_pixel = geo::geo_to_pixel(&self.center, self.zoom);
        self.translate = Point::new(
            self.size.x / 2.0 - center_pixel.x,
            self.size.y / 2.0 - center_pixel.y,
        );
    }

    /// Recompute the stored center from the translation.
    fn sync_center(&mut self) {
        self.center = self.coordinate_at(self.size.x / 2.0, self.size.y / 2.0);
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(LatLng::default(), 0.0, Point::new(800.0, 600.0))
    }
}
