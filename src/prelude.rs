//! Prelude module for common slipmap types and traits
//!
//! Re-exports the most commonly used types for easy importing with
//! `use slipmap::prelude::*;`

pub use crate::core::{
    address::TileAddress,
    bounds::Bounds,
    geo::{LatLng, Point},
    map::{Map, MapBuilder},
    viewport::Viewport,
};

pub use crate::tiles::{
    disk::DiskCache,
    loader::{FetchConfig, FetchPipeline, TileBytes, TileResult},
    planner::{PlanOutcome, TileRange},
    pyramid::{TilePyramid, TileState},
    source::{HttpTileRetriever, OpenStreetMapSource, TileRetriever, TileSource},
};

pub use crate::{Error as MapError, Result};

pub use std::{
    sync::Arc,
    time::{Duration, Instant},
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
