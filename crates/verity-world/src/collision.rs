//! Broad-phase collision queries.
//!
//! Queries never reorder the collections they scan, so indices handed out
//! here stay valid for as long as the caller does not push or remove
//! entities.

use crate::entity::{Collidable, HasRectangle, Platform, StaticTile};
use crate::geometry::Rectangle;

/// The first solid object found by [`first_solid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolidHit {
    Platform(usize),
    Tile(usize),
}

/// Lazily yields `(index, entity)` for every entity intersecting `rect`.
pub fn collide<'a, T: Collidable>(
    rect: Rectangle,
    entities: &'a [T],
) -> impl Iterator<Item = (usize, &'a T)> + 'a {
    entities
        .iter()
        .enumerate()
        .filter(move |(_, e)| e.rectangle().intersects(&rect))
}

/// Whether any entity with collisions enabled intersects `rect`.
pub fn collide_any<T: Collidable>(rect: Rectangle, entities: &[T]) -> bool {
    entities
        .iter()
        .any(|e| !e.collisions_disabled() && e.rectangle().intersects(&rect))
}

/// First enabled platform intersecting `rect`, falling back to the first tile.
pub fn first_solid(rect: Rectangle, platforms: &[Platform], tiles: &[StaticTile]) -> Option<SolidHit> {
    let hits = |r: &Rectangle| rect.intersects(r);

    platforms
        .iter()
        .position(|p| !p.collisions_disabled() && hits(&p.rectangle()))
        .map(SolidHit::Platform)
        .or_else(|| {
            tiles
                .iter()
                .position(|t| !t.collisions_disabled() && hits(&t.rectangle()))
                .map(SolidHit::Tile)
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Body;
    use crate::geometry::Point;
    use crate::physics::MovingObject;

    fn tile(x: f64, y: f64) -> StaticTile {
        StaticTile {
            body: Body::new(Point::new(x, y), 32.0, 32.0),
            gid: 1,
        }
    }

    fn platform(x: f64, y: f64, disabled: bool) -> Platform {
        Platform {
            motion: MovingObject::stationary(Point::new(x, y), 64.0, 16.0),
            name: "p".into(),
            collisions_disabled: disabled,
        }
    }

    #[test]
    fn collide_yields_indices_in_order() {
        let tiles = vec![tile(0.0, 0.0), tile(100.0, 0.0), tile(16.0, 0.0)];
        let query = Rectangle::from_origin(Point::new(10.0, 10.0), 10.0, 10.0);
        let hits: Vec<usize> = collide(query, &tiles).map(|(i, _)| i).collect();
        assert_eq!(hits, vec![0, 2]);
    }

    #[test]
    fn collide_does_not_reorder() {
        let tiles = vec![tile(100.0, 0.0), tile(0.0, 0.0)];
        let query = tiles[1].rectangle();
        assert_eq!(collide(query, &tiles).count(), 1);
        assert_eq!(tiles[1].body.origin, Point::new(0.0, 0.0));
    }

    #[test]
    fn first_solid_prefers_platforms() {
        let tiles = vec![tile(0.0, 0.0)];
        let platforms = vec![platform(0.0, 0.0, false)];
        let query = Rectangle::from_origin(Point::new(4.0, 4.0), 8.0, 8.0);
        assert_eq!(first_solid(query, &platforms, &tiles), Some(SolidHit::Platform(0)));
    }

    #[test]
    fn first_solid_skips_disabled() {
        let tiles = vec![tile(0.0, 0.0)];
        let platforms = vec![platform(0.0, 0.0, true)];
        let query = Rectangle::from_origin(Point::new(4.0, 4.0), 8.0, 8.0);
        assert_eq!(first_solid(query, &platforms, &tiles), Some(SolidHit::Tile(0)));
        assert!(!collide_any(query, &platforms));
        assert!(collide_any(query, &tiles));
    }

    #[test]
    fn first_solid_none_when_clear() {
        let tiles = vec![tile(0.0, 0.0)];
        let query = Rectangle::from_origin(Point::new(40.0, 0.0), 8.0, 8.0);
        assert_eq!(first_solid(query, &[], &tiles), None);
    }
}
