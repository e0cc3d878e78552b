use crate::core::constants::MAX_ZOOM;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a raster tile by zoom level and grid column/row.
///
/// An address is only meaningful for its own zoom level: `i` and `j` range
/// over `[0, 2^zoom)` and the same `(i, j)` pair denotes a different part of
/// the world at every level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileAddress {
    pub zoom: u8,
    pub i: u64,
    pub j: u64,
}

impl TileAddress {
    pub fn new(zoom: u8, i: u64, j: u64) -> Self {
        Self { zoom, i, j }
    }

    /// Number of tile columns/rows at this zoom level.
    pub fn world_size(zoom: u8) -> u64 {
        1u64 << zoom
    }

    /// Checks that the column/row actually exist at this zoom level.
    pub fn is_valid(&self) -> bool {
        self.zoom < MAX_ZOOM && self.i < Self::world_size(self.zoom) && self.j < Self::world_size(self.zoom)
    }

    /// The coarser tile one zoom level up that contains this tile.
    pub fn parent(&self) -> Option<TileAddress> {
        if self.zoom == 0 {
            None
        } else {
            Some(TileAddress::new(self.zoom - 1, self.i / 2, self.j / 2))
        }
    }

    /// The four finer tiles one zoom level down, empty at the deepest level.
    pub fn children(&self) -> Vec<TileAddress> {
        if self.zoom + 1 >= MAX_ZOOM {
            Vec::new()
        } else {
            vec![
                TileAddress::new(self.zoom + 1, self.i * 2, self.j * 2),
                TileAddress::new(self.zoom + 1, self.i * 2 + 1, self.j * 2),
                TileAddress::new(self.zoom + 1, self.i * 2, self.j * 2 + 1),
                TileAddress::new(self.zoom + 1, self.i * 2 + 1, self.j * 2 + 1),
            ]
        }
    }

    /// Linear cache key within this zoom level: `i * 2^zoom + j`.
    ///
    /// Injective for a fixed zoom only; the pyramid keeps one keyspace per
    /// level, so the zoom is part of the bucket selection, not the key.
    pub fn cache_key(&self) -> u64 {
        self.i * Self::world_size(self.zoom) + self.j
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "z{}/{}/{}", self.zoom, self.i, self.j)
    }
}
