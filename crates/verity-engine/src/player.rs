//! The player character.

use serde::{Deserialize, Serialize};
use verity_world::prelude::*;

pub const PLAYER_WIDTH: f64 = 32.0;
pub const PLAYER_HEIGHT: f64 = 32.0;

/// Ticks each animation frame stays on screen.
const ANIMATION_FRAME_TICKS: u64 = 10;

/// Solid object currently supporting the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroundRef {
    Platform(usize),
    Tile(usize),
}

impl From<SolidHit> for GroundRef {
    fn from(hit: SolidHit) -> Self {
        match hit {
            SolidHit::Platform(i) => GroundRef::Platform(i),
            SolidHit::Tile(i) => GroundRef::Tile(i),
        }
    }
}

/// Which sprite sequence the player shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimationKind {
    #[default]
    Standing,
    Running,
    Jumping,
    Falling,
}

impl AnimationKind {
    fn frames(self) -> u64 {
        match self {
            AnimationKind::Running => 2,
            _ => 1,
        }
    }
}

/// Draw cache. Never part of the checksum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnimationState {
    pub kind: AnimationKind,
    pub frame: u64,
    ticks_in_frame: u64,
}

/// Ordered names of collected items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub items: Vec<String>,
}

impl Inventory {
    pub fn contains(&self, name: &str) -> bool {
        self.items.iter().any(|i| i == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub body: Body,
    pub physical: Physical,
    pub inventory: Inventory,
    pub coins: i64,
    pub health: i32,
    pub looks_right: bool,
    on_ground: Option<GroundRef>,
    previous_ground: Option<GroundRef>,
    coyote: bool,
    coyote_since: Option<u64>,
    #[serde(skip)]
    animation: AnimationState,
}

impl Player {
    pub fn new(spawn: Point, health: i32) -> Self {
        Self {
            body: Body::new(spawn, PLAYER_WIDTH, PLAYER_HEIGHT),
            physical: Physical::default(),
            inventory: Inventory::default(),
            coins: 0,
            health,
            looks_right: true,
            on_ground: None,
            previous_ground: None,
            coyote: false,
            coyote_since: None,
            animation: AnimationState::default(),
        }
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0
    }

    pub fn on_ground(&self) -> Option<GroundRef> {
        self.on_ground
    }

    /// Ground of the tick before the last [`set_on_ground`](Self::set_on_ground).
    pub fn previous_ground(&self) -> Option<GroundRef> {
        self.previous_ground
    }

    /// Whether a jump is accepted right now.
    pub fn can_jump(&self) -> bool {
        self.coyote
    }

    /// Consumes the jump window.
    pub fn reset_coyote(&mut self) {
        self.coyote = false;
        self.coyote_since = None;
    }

    /// Records what the player stands on at `tick`.
    ///
    /// Landing reopens the jump window. Leaving the ground keeps it open for
    /// `coyote_ticks` ticks counted from the first airborne tick.
    pub fn set_on_ground(&mut self, ground: Option<GroundRef>, tick: u64, coyote_ticks: u64) {
        self.previous_ground = self.on_ground;
        self.on_ground = ground;

        if ground.is_some() {
            self.coyote = true;
            self.coyote_since = None;
            return;
        }

        if !self.coyote {
            return;
        }
        let since = *self.coyote_since.get_or_insert(tick);
        if tick - since > coyote_ticks {
            self.reset_coyote();
        }
    }

    /// Puts the player back at `spawn` with fresh motion state.
    pub fn respawn(&mut self, spawn: Point, health: i32) {
        self.body.move_to(spawn);
        self.health = health;
        self.physical = Physical::default();
        self.on_ground = None;
        self.previous_ground = None;
        self.reset_coyote();
    }

    pub fn animation(&self) -> AnimationState {
        self.animation
    }

    /// Advances the draw cache from the current motion state.
    pub fn update_animation(&mut self) {
        let kind = if self.physical.speed.y < 0.0 {
            AnimationKind::Jumping
        } else if self.physical.speed.y > 0.0 && self.on_ground.is_none() {
            AnimationKind::Falling
        } else if self.physical.speed.x != 0.0 {
            AnimationKind::Running
        } else {
            AnimationKind::Standing
        };

        let animation = &mut self.animation;
        if animation.kind != kind {
            *animation = AnimationState {
                kind,
                ..AnimationState::default()
            };
            return;
        }
        animation.ticks_in_frame += 1;
        if animation.ticks_in_frame >= ANIMATION_FRAME_TICKS {
            animation.ticks_in_frame = 0;
            animation.frame = (animation.frame + 1) % kind.frames();
        }
    }
}

impl HasRectangle for Player {
    fn rectangle(&self) -> Rectangle {
        self.body.rectangle()
    }
}

impl Collidable for Player {}

impl Movable for Player {
    fn move_by(&mut self, delta: Vector) {
        self.body.move_by(delta);
    }

    fn move_to(&mut self, point: Point) {
        self.body.move_to(point);
    }
}
