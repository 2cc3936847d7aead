//! Verity World -- deterministic 2D geometry, motion and entity primitives.
//!
//! Everything in this crate is a pure function of its inputs. There are no
//! clocks, no global state and no unseeded randomness: randomness comes from
//! [`rng::tick_rng`], which derives a fresh stream from a tick counter. Two
//! machines that feed the same values through these types always arrive at
//! bit-identical results, which is what the checksum protocol in
//! `verity-engine` relies on.
//!
//! # Quick Start
//!
//! ```
//! use verity_world::prelude::*;
//!
//! let solid = Rectangle::from_origin(Point::new(0.0, 0.0), 32.0, 32.0);
//! let player = Rectangle::from_origin(Point::new(20.0, 0.0), 32.0, 32.0);
//!
//! assert!(solid.intersects(&player));
//! assert_eq!(solid.push_vector_x(&player), Vector::new(12.0, 0.0));
//! ```

#![deny(unsafe_code)]

pub mod collision;
pub mod entity;
pub mod geometry;
pub mod physics;
pub mod rng;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while building world objects from content data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// A movement path keyword that is not one of `horizontal`, `vertical`
    /// or `circular`.
    #[error("unknown movement path '{keyword}', expected one of: horizontal, vertical, circular")]
    UnknownPath { keyword: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::collision::{collide, collide_any, first_solid, SolidHit};
    pub use crate::entity::{
        BackgroundImage, Body, Bullet, Collidable, HasRectangle, Item, Movable, Moving, Platform,
        Portal, SlotMachine, Spike, StaticTile, BULLET_SIZE,
    };
    pub use crate::geometry::{Point, Rectangle, Vector};
    pub use crate::physics::{MovementPath, MovingObject, Physical, GRAVITY_ACCELERATION};
    pub use crate::rng::{rand_int, tick_rng, tick_rng_salted};
    pub use crate::WorldError;
}
