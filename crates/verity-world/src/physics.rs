//! Per-axis motion integration and bounded path movement.
//!
//! Motion is integrated one axis at a time. Callers advance every object on
//! the X axis, resolve collisions on X, and only then do the same for Y; the
//! split keeps fast objects from clipping corners diagonally.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entity::{Body, HasRectangle, Movable, Moving};
use crate::geometry::{Point, Rectangle, Vector};
use crate::WorldError;

/// Downward acceleration applied to airborne bodies, in units per tick².
pub const GRAVITY_ACCELERATION: f64 = 2.0 / 6.0;

// ---------------------------------------------------------------------------
// Physical
// ---------------------------------------------------------------------------

/// Speed and acceleration of a body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Physical {
    pub speed: Vector,
    pub acceleration: Vector,
}

impl Physical {
    pub fn apply_acceleration_x(&mut self) {
        self.speed.x += self.acceleration.x;
    }

    pub fn apply_acceleration_y(&mut self) {
        self.speed.y += self.acceleration.y;
    }
}

// ---------------------------------------------------------------------------
// MovementPath
// ---------------------------------------------------------------------------

/// Shape of the path a [`MovingObject`] oscillates along.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementPath {
    /// Does not move.
    #[default]
    None,
    Horizontal,
    Vertical,
    /// Couples both axes around a midpoint, tracing a diamond.
    Circular,
}

impl MovementPath {
    fn moves_x(self) -> bool {
        matches!(self, MovementPath::Horizontal | MovementPath::Circular)
    }

    fn moves_y(self) -> bool {
        matches!(self, MovementPath::Vertical | MovementPath::Circular)
    }
}

impl FromStr for MovementPath {
    type Err = WorldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "horizontal" => Ok(MovementPath::Horizontal),
            "vertical" => Ok(MovementPath::Vertical),
            "circular" => Ok(MovementPath::Circular),
            other => Err(WorldError::UnknownPath {
                keyword: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// MovingObject
// ---------------------------------------------------------------------------

/// A body confined to a path between `start` and `end`.
///
/// Reaching either end clamps the body to it and schedules an impulse of
/// `-2 * speed`. The impulse becomes the acceleration on the *next* advance of
/// that axis, so the reversal is observable one tick after the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingObject {
    pub body: Body,
    pub physical: Physical,
    next_acceleration: Vector,
    start: Point,
    end: Point,
    mid: Point,
    path: MovementPath,
    is_static: bool,
}

impl MovingObject {
    /// Builds an object at `origin` that travels `distance` units along `path`
    /// at `speed` units per tick. A zero speed or [`MovementPath::None`]
    /// produces a static object.
    pub fn new(
        origin: Point,
        width: f64,
        height: f64,
        path: MovementPath,
        distance: f64,
        speed: f64,
    ) -> Self {
        let half = distance / 2.0;
        let (body_origin, start, end, initial_speed) = match path {
            MovementPath::None => (origin, origin, origin, Vector::ZERO),
            MovementPath::Vertical => (
                origin,
                Point::new(origin.x, origin.y - distance),
                origin,
                Vector::new(0.0, speed),
            ),
            MovementPath::Horizontal => (
                origin,
                origin,
                Point::new(origin.x + distance, origin.y),
                Vector::new(speed, 0.0),
            ),
            MovementPath::Circular => (
                Point::new(origin.x - half, origin.y),
                Point::new(origin.x - half, origin.y - half),
                Point::new(origin.x + half, origin.y + half),
                Vector::new(speed, speed),
            ),
        };

        Self {
            body: Body::new(body_origin, width, height),
            physical: Physical {
                speed: initial_speed,
                acceleration: Vector::ZERO,
            },
            next_acceleration: Vector::ZERO,
            start,
            end,
            mid: origin,
            path,
            is_static: speed == 0.0 || path == MovementPath::None,
        }
    }

    /// A body that never moves.
    pub fn stationary(origin: Point, width: f64, height: f64) -> Self {
        Self::new(origin, width, height, MovementPath::None, 0.0, 0.0)
    }

    pub fn path(&self) -> MovementPath {
        self.path
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Advances the X axis by one tick.
    pub fn advance_x(&mut self) {
        if self.is_static {
            return;
        }
        self.physical.acceleration.x = self.next_acceleration.x;
        self.physical.apply_acceleration_x();
        self.next_acceleration.x = 0.0;
        if self.path.moves_x() {
            self.step_x();
        }
    }

    /// Advances the Y axis by one tick.
    pub fn advance_y(&mut self) {
        if self.is_static {
            return;
        }
        self.physical.acceleration.y = self.next_acceleration.y;
        self.physical.apply_acceleration_y();
        self.next_acceleration.y = 0.0;
        if self.path.moves_y() {
            self.step_y();
        }
    }

    fn step_x(&mut self) {
        let speed = if self.path == MovementPath::Circular {
            if self.body.origin.y >= self.mid.y {
                self.physical.speed.x.abs()
            } else {
                -self.physical.speed.x.abs()
            }
        } else {
            self.physical.speed.x
        };

        let mut next = self.body.origin.x + speed;
        if speed > 0.0 && next >= self.end.x {
            self.next_acceleration.x = -2.0 * speed;
            next = self.end.x;
        } else if speed < 0.0 && next <= self.start.x {
            self.next_acceleration.x = -2.0 * speed;
            next = self.start.x;
        }
        self.body.origin.x = next;
    }

    fn step_y(&mut self) {
        let speed = if self.path == MovementPath::Circular {
            if self.body.origin.x >= self.mid.x {
                -self.physical.speed.y.abs()
            } else {
                self.physical.speed.y.abs()
            }
        } else {
            self.physical.speed.y
        };

        let mut next = self.body.origin.y + speed;
        if speed > 0.0 && next >= self.end.y {
            self.next_acceleration.y = -2.0 * speed;
            next = self.end.y;
        } else if speed < 0.0 && next <= self.start.y {
            self.next_acceleration.y = -2.0 * speed;
            next = self.start.y;
        }
        self.body.origin.y = next;
    }
}

impl HasRectangle for MovingObject {
    fn rectangle(&self) -> Rectangle {
        self.body.rectangle()
    }
}

impl Movable for MovingObject {
    fn move_by(&mut self, delta: Vector) {
        self.body.move_by(delta);
    }

    fn move_to(&mut self, point: Point) {
        self.body.move_to(point);
    }
}

impl Moving for MovingObject {
    fn velocity(&self) -> Vector {
        self.physical.speed
    }

    fn acceleration(&self) -> Vector {
        self.physical.acceleration
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn xs(obj: &mut MovingObject, ticks: usize) -> Vec<f64> {
        (0..ticks)
            .map(|_| {
                obj.advance_x();
                obj.advance_y();
                obj.body.origin.x
            })
            .collect()
    }

    #[test]
    fn parse_path_keywords() {
        assert_eq!("horizontal".parse::<MovementPath>(), Ok(MovementPath::Horizontal));
        assert_eq!("vertical".parse::<MovementPath>(), Ok(MovementPath::Vertical));
        assert_eq!("circular".parse::<MovementPath>(), Ok(MovementPath::Circular));
        assert_eq!(
            "zigzag".parse::<MovementPath>(),
            Err(WorldError::UnknownPath {
                keyword: "zigzag".to_string()
            })
        );
    }

    #[test]
    fn horizontal_bounce_sequence() {
        let mut obj =
            MovingObject::new(Point::new(0.0, 0.0), 10.0, 10.0, MovementPath::Horizontal, 10.0, 3.0);
        let positions = xs(&mut obj, 9);
        assert_eq!(positions, vec![3.0, 6.0, 9.0, 10.0, 7.0, 4.0, 1.0, 0.0, 3.0]);
    }

    #[test]
    fn reversal_is_observable_one_tick_after_boundary() {
        let mut obj =
            MovingObject::new(Point::new(0.0, 0.0), 10.0, 10.0, MovementPath::Horizontal, 10.0, 3.0);
        for _ in 0..4 {
            obj.advance_x();
        }
        // Clamped at the end, speed still positive.
        assert_eq!(obj.body.origin.x, 10.0);
        assert_eq!(obj.physical.speed.x, 3.0);

        obj.advance_x();
        assert_eq!(obj.physical.acceleration.x, -6.0);
        assert_eq!(obj.physical.speed.x, -3.0);
    }

    #[test]
    fn round_trip_travels_twice_the_distance() {
        let mut obj =
            MovingObject::new(Point::new(5.0, 0.0), 10.0, 10.0, MovementPath::Horizontal, 10.0, 3.0);
        let mut travelled = 0.0;
        let mut previous = obj.body.origin.x;
        loop {
            obj.advance_x();
            travelled += (obj.body.origin.x - previous).abs();
            previous = obj.body.origin.x;
            if obj.body.origin.x == 5.0 {
                break;
            }
        }
        assert_eq!(travelled, 20.0);
    }

    #[test]
    fn vertical_path_starts_at_bottom_and_rises() {
        let mut obj =
            MovingObject::new(Point::new(0.0, 100.0), 10.0, 10.0, MovementPath::Vertical, 20.0, -4.0);
        let mut ys = Vec::new();
        for _ in 0..7 {
            obj.advance_x();
            obj.advance_y();
            ys.push(obj.body.origin.y);
        }
        assert_eq!(ys, vec![96.0, 92.0, 88.0, 84.0, 80.0, 84.0, 88.0]);
        // X never changes on a vertical path.
        assert_eq!(obj.body.origin.x, 0.0);
    }

    #[test]
    fn circular_path_stays_in_diamond() {
        let mut obj =
            MovingObject::new(Point::new(50.0, 50.0), 10.0, 10.0, MovementPath::Circular, 20.0, 2.0);
        assert_eq!(obj.body.origin, Point::new(40.0, 50.0));
        for _ in 0..200 {
            obj.advance_x();
            obj.advance_y();
            let o = obj.body.origin;
            assert!((40.0..=60.0).contains(&o.x), "x out of range: {}", o.x);
            assert!((40.0..=60.0).contains(&o.y), "y out of range: {}", o.y);
        }
    }

    #[test]
    fn zero_speed_is_static() {
        let mut obj =
            MovingObject::new(Point::new(1.0, 2.0), 10.0, 10.0, MovementPath::Horizontal, 10.0, 0.0);
        assert!(obj.is_static());
        obj.advance_x();
        obj.advance_y();
        assert_eq!(obj.body.origin, Point::new(1.0, 2.0));
        assert!(MovingObject::stationary(Point::new(0.0, 0.0), 1.0, 1.0).is_static());
    }
}
