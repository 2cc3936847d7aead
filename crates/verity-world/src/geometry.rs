//! Points, vectors and axis-aligned rectangles.
//!
//! The coordinate system is screen-like: `x` grows to the right and `y` grows
//! downwards, so a rectangle's `top` is numerically smaller than its `bottom`.

use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Displacements shorter than this are treated as "already separated".
const PUSH_EPSILON: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Point / Vector
// ---------------------------------------------------------------------------

/// A position in world space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Add<Vector> for Point {
    type Output = Point;

    fn add(self, rhs: Vector) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Vector;

    fn sub(self, rhs: Point) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// A displacement or velocity in world space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {
    pub const ZERO: Vector = Vector::new(0.0, 0.0);

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean length.
    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Unit vector with the same direction. The zero vector stays zero.
    pub fn normalize(self) -> Vector {
        let length = self.length();
        if length == 0.0 {
            return Vector::ZERO;
        }
        Vector::new(self.x / length, self.y / length)
    }
}

impl Add for Vector {
    type Output = Vector;

    fn add(self, rhs: Vector) -> Vector {
        Vector::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Neg for Vector {
    type Output = Vector;

    fn neg(self) -> Vector {
        Vector::new(-self.x, -self.y)
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;

    fn mul(self, rhs: f64) -> Vector {
        Vector::new(self.x * rhs, self.y * rhs)
    }
}

// ---------------------------------------------------------------------------
// Rectangle
// ---------------------------------------------------------------------------

/// Axis-aligned box. Degenerate rectangles (zero width or height) are legal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rectangle {
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle whose top-left corner is `origin`.
    pub fn from_origin(origin: Point, width: f64, height: f64) -> Self {
        Self::new(origin.x, origin.y, origin.x + width, origin.y + height)
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Grows the rectangle by `delta` on every side.
    pub fn extended(&self, delta: f64) -> Rectangle {
        Rectangle::new(
            self.left - delta,
            self.top - delta,
            self.right + delta,
            self.bottom + delta,
        )
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    pub fn translated(&self, v: Vector) -> Rectangle {
        Rectangle::new(
            self.left + v.x,
            self.top + v.y,
            self.right + v.x,
            self.bottom + v.y,
        )
    }

    /// Strict overlap test: rectangles that only touch along an edge do not
    /// intersect.
    pub fn intersects(&self, other: &Rectangle) -> bool {
        self.right > other.left
            && other.right > self.left
            && self.bottom > other.top
            && other.bottom > self.top
    }

    /// Horizontal displacement that moves `other` out of `self`.
    ///
    /// The two candidates are "push to the right of `self`" and "push to the
    /// left of `self`"; the first wins unless the second is strictly shorter.
    /// Returns [`Vector::ZERO`] when the rectangles do not intersect or when
    /// they are already aligned on this axis.
    pub fn push_vector_x(&self, other: &Rectangle) -> Vector {
        let aligned = Vector::new(self.right - other.right, self.left - other.left);
        if !self.intersects(other) || aligned.length() < PUSH_EPSILON {
            return Vector::ZERO;
        }

        shorter(
            Vector::new(self.right - other.left, 0.0),
            Vector::new(self.left - other.right, 0.0),
        )
    }

    /// Vertical counterpart of [`Rectangle::push_vector_x`].
    ///
    /// A result with `y <= 0` lifts `other` on top of `self`; `y > 0` pushes
    /// it below.
    pub fn push_vector_y(&self, other: &Rectangle) -> Vector {
        let aligned = Vector::new(self.bottom - other.bottom, self.top - other.top);
        if !self.intersects(other) || aligned.length() < PUSH_EPSILON {
            return Vector::ZERO;
        }

        shorter(
            Vector::new(0.0, self.bottom - other.top),
            Vector::new(0.0, self.top - other.bottom),
        )
    }
}

fn shorter(first: Vector, second: Vector) -> Vector {
    if second.length() < first.length() {
        second
    } else {
        first
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
