use crate::core::constants::TILE_SIZE;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Latitudes beyond this are outside the Web Mercator square.
pub const MAX_LATITUDE: f64 = 85.0511287798;

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lng >= -180.0 && self.lng <= 180.0
    }

    /// Wraps longitude to [-180, 180] range
    pub fn wrap_lng(lng: f64) -> f64 {
        let wrapped = lng % 360.0;
        if wrapped > 180.0 {
            wrapped - 360.0
        } else if wrapped < -180.0 {
            wrapped + 360.0
        } else {
            wrapped
        }
    }

    /// Clamps latitude to the projectable range
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a point in screen, pixel or tile-space coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn subtract(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn multiply(&self, scalar: f64) -> Point {
        Point::new(self.x * scalar, self.y * scalar)
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Projects a geographic coordinate into slippy-map tile space at a
/// continuous zoom level: one unit per tile, origin at the north-west corner
/// of the world.
pub fn geo_to_tile(coord: &LatLng, zoom: f64) -> Point {
    let n = 2_f64.powf(zoom);
    let lat_rad = LatLng::clamp_lat(coord.lat).to_radians();
    let x = n / 360.0 * (coord.lng + 180.0);
    let y = n * (1.0 - ((lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI)) / 2.0;
    Point::new(x, y)
}

/// Projects a geographic coordinate into world pixel space at a continuous
/// zoom level (tile space scaled by the tile size).
pub fn geo_to_pixel(coord: &LatLng, zoom: f64) -> Point {
    geo_to_tile(coord, zoom).multiply(f64::from(TILE_SIZE))
}

/// Inverse of [`geo_to_pixel`]: recovers the geographic coordinate under a
/// world pixel position. Used to report the coordinate under the pointer.
pub fn pixel_to_geo(pixel: &Point, zoom: f64) -> LatLng {
    let scale = 2_f64.powf(zoom) * f64::from(TILE_SIZE);
    let lat_rad = PI - (2.0 * PI * pixel.y) / scale;
    let lat = lat_rad.sinh().atan().to_degrees();
    let lng = pixel.x / scale * 360.0 - 180.0;
    LatLng::new(lat, lng)
}
