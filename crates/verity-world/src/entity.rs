//! World object types and the capabilities they expose.
//!
//! Shared "base object" behavior is expressed as small capability traits
//! ([`HasRectangle`], [`Movable`], [`Moving`], [`Collidable`]). Each entity
//! composes a [`Body`] or a [`MovingObject`] and delegates to it explicitly.

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rectangle, Vector};
use crate::physics::MovingObject;

/// Side length of an enemy projectile.
pub const BULLET_SIZE: f64 = 1.0;

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Anything with an axis-aligned bounding box.
pub trait HasRectangle {
    fn rectangle(&self) -> Rectangle;
}

/// An object the collision queries consider.
pub trait Collidable: HasRectangle {
    /// Disabled objects are skipped by every collision query.
    fn collisions_disabled(&self) -> bool {
        false
    }
}

/// An object that can be displaced.
pub trait Movable {
    fn move_by(&mut self, delta: Vector);
    fn move_to(&mut self, point: Point);
}

/// An object with its own velocity, carried over to whatever rides it.
pub trait Moving {
    fn velocity(&self) -> Vector;
    fn acceleration(&self) -> Vector;
}

/// Top-left origin plus size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub origin: Point,
    pub width: f64,
    pub height: f64,
}

impl Body {
    pub const fn new(origin: Point, width: f64, height: f64) -> Self {
        Self {
            origin,
            width,
            height,
        }
    }
}

impl HasRectangle for Body {
    fn rectangle(&self) -> Rectangle {
        Rectangle::from_origin(self.origin, self.width, self.height)
    }
}

impl Movable for Body {
    fn move_by(&mut self, delta: Vector) {
        self.origin = self.origin + delta;
    }

    fn move_to(&mut self, point: Point) {
        self.origin = point;
    }
}

/// Implements [`HasRectangle`] and [`Movable`] by forwarding to a field.
macro_rules! delegate_body {
    ($ty:ty, $field:ident) => {
        impl HasRectangle for $ty {
            fn rectangle(&self) -> Rectangle {
                self.$field.rectangle()
            }
        }

        impl Movable for $ty {
            fn move_by(&mut self, delta: Vector) {
                self.$field.move_by(delta);
            }

            fn move_to(&mut self, point: Point) {
                self.$field.move_to(point);
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Static geometry
// ---------------------------------------------------------------------------

/// A solid map tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticTile {
    pub body: Body,
    /// Tile id from the map, kept for presentation.
    pub gid: u32,
}

delegate_body!(StaticTile, body);
impl Collidable for StaticTile {}

/// Decorative geometry. Never solid, only reported by ordered queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundImage {
    pub body: Body,
}

delegate_body!(BackgroundImage, body);
impl Collidable for BackgroundImage {}

// ---------------------------------------------------------------------------
// Pickups and teleports
// ---------------------------------------------------------------------------

/// A collectible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub body: Body,
    pub name: String,
    /// All important items must be collected to win.
    pub important: bool,
    /// Reward for defeating the boss.
    pub boss: bool,
    pub collected: bool,
}

delegate_body!(Item, body);

impl Collidable for Item {
    fn collisions_disabled(&self) -> bool {
        self.collected
    }
}

/// Teleports the player to `teleport_to` on contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portal {
    pub body: Body,
    pub name: String,
    /// Name of the destination portal as written in the level.
    pub destination: Option<String>,
    /// Resolved destination origin. `None` makes the portal inert.
    pub teleport_to: Option<Point>,
    /// Boss variant this portal opens the arena for.
    pub boss: Option<String>,
}

delegate_body!(Portal, body);
impl Collidable for Portal {}

// ---------------------------------------------------------------------------
// Hazards and moving geometry
// ---------------------------------------------------------------------------

/// Damages the player on every tick of overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spike {
    pub motion: MovingObject,
    pub damage: i32,
}

delegate_body!(Spike, motion);
impl Collidable for Spike {}

impl Moving for Spike {
    fn velocity(&self) -> Vector {
        self.motion.velocity()
    }

    fn acceleration(&self) -> Vector {
        self.motion.acceleration()
    }
}

/// A solid, possibly moving, platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub motion: MovingObject,
    pub name: String,
    pub collisions_disabled: bool,
}

delegate_body!(Platform, motion);

impl Collidable for Platform {
    fn collisions_disabled(&self) -> bool {
        self.collisions_disabled
    }
}

impl Moving for Platform {
    fn velocity(&self) -> Vector {
        self.motion.velocity()
    }

    fn acceleration(&self) -> Vector {
        self.motion.acceleration()
    }
}

/// An enemy projectile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bullet {
    pub body: Body,
    pub damage: i32,
    /// Homing speed. Zero means the bullet flies straight along `direction`.
    pub seek_speed: f64,
    pub direction: Vector,
    /// Set once the bullet has hit the player.
    pub triggered: bool,
}

impl Bullet {
    pub fn new(origin: Point, direction: Vector, damage: i32, seek_speed: f64) -> Self {
        Self {
            body: Body::new(origin, BULLET_SIZE, BULLET_SIZE),
            damage,
            seek_speed,
            direction,
            triggered: false,
        }
    }
}

delegate_body!(Bullet, body);
impl Collidable for Bullet {}

// ---------------------------------------------------------------------------
// Slot machine
// ---------------------------------------------------------------------------

/// Pays out coins with a fixed probability, at most once per cooldown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotMachine {
    pub body: Body,
    pub payout: i64,
    /// Minimum ticks between two spins.
    pub cooldown: u64,
    pub probability: f64,
    pub seed: u64,
    pub last_triggered: Option<u64>,
}

impl SlotMachine {
    /// Whether a spin is allowed at `tick`.
    pub fn ready(&self, tick: u64) -> bool {
        match self.last_triggered {
            None => true,
            Some(last) => tick.saturating_sub(last) >= self.cooldown,
        }
    }
}

delegate_body!(SlotMachine, body);
impl Collidable for SlotMachine {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
