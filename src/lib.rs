//! # slipmap
//!
//! The tile pyramid core of a pannable, zoomable slippy map: Web Mercator
//! projection math, a per-zoom-level tile cache with covering-tile
//! substitution, viewport planning with overscan and eviction sweeps, and an
//! asynchronous, deduplicated fetch pipeline backed by a local disk cache.
//!
//! Rendering, gesture handling and widget lifecycle are deliberately left to
//! the embedding application: this crate tells it *which* tiles to show,
//! *where* on screen, and *whether* their pixels have arrived yet.

pub mod core;
pub mod prelude;
pub mod runtime;
pub mod tiles;

pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    address::TileAddress,
    bounds::Bounds,
    geo::{LatLng, Point},
    map::{Map, MapBuilder},
    viewport::Viewport,
};

pub use crate::tiles::{
    disk::DiskCache,
    loader::{FetchConfig, FetchPipeline, FetchResult, TileBytes, TileResult},
    planner::{PlanOutcome, TileRange},
    pyramid::{TilePyramid, TileState},
    source::{HttpTileRetriever, OpenStreetMapSource, TileRetriever, TileSource},
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("tile server returned HTTP {status} for {address}")]
    HttpStatus {
        status: reqwest::StatusCode,
        address: TileAddress,
    },

    #[error("disk cache error: {0}")]
    Disk(#[from] std::io::Error),

    #[error("corrupt tile image: {0}")]
    Decode(String),
}

/// Error type alias for convenience
pub type Error = MapError;
