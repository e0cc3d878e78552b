//! Ancestor substitution: while a tile loads, the nearest `Ready` ancestor is
//! scaled up in its place so the screen never shows a hole.

use crate::core::address::TileAddress;
use crate::tiles::pyramid::{TilePyramid, TileState};

/// Walk up the parent chain of `address` and return the nearest ancestor that
/// is resident and `Ready`.
///
/// Ancestors that are still `Loading` (or `Failed`, or simply absent) are
/// skipped in favor of coarser levels; the walk may climb all the way to the
/// root and return `None` when nothing usable is cached.
pub fn find_covering(pyramid: &TilePyramid, address: TileAddress) -> Option<TileAddress> {
    let mut current = address;
    while let Some(parent) = current.parent() {
        if pyramid.state_of(parent) == Some(TileState::Ready) {
            return Some(parent);
        }
        current = parent;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ready(pyramid: &mut TilePyramid, addr: TileAddress) {
        pyramid.lookup_or_create(addr);
        pyramid.apply_result(addr, Ok(Arc::new(vec![0u8; 4])));
    }

    #[test]
    fn nearest_ready_ancestor_wins() {
        let mut pyramid = TilePyramid::new();
        let target = TileAddress::new(6, 40, 24);
        ready(&mut pyramid, TileAddress::new(5, 20, 12));
        ready(&mut pyramid, TileAddress::new(4, 10, 6));

        assert_eq!(
            find_covering(&pyramid, target),
            Some(TileAddress::new(5, 20, 12))
        );
    }

    #[test]
    fn loading_ancestor_is_skipped() {
        let mut pyramid = TilePyramid::new();
        let target = TileAddress::new(6, 40, 24);
        // Direct parent resident but not ready yet.
        pyramid.lookup_or_create(TileAddress::new(5, 20, 12));
        ready(&mut pyramid, TileAddress::new(3, 5, 3));

        assert_eq!(
            find_covering(&pyramid, target),
            Some(TileAddress::new(3, 5, 3))
        );
    }

    #[test]
    fn empty_pyramid_has_no_covering() {
        let pyramid = TilePyramid::new();
        assert_eq!(find_covering(&pyramid, TileAddress::new(6, 40, 24)), None);
    }
}
