//! Boss state machines.
//!
//! A boss is ticked by the engine once the player has entered the arena. All
//! randomness is drawn from [`tick_rng`], reseeded from the tick counter on
//! every call, so bullet patterns and drift replay identically.

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};
use verity_world::prelude::*;

use crate::config::Rules;

pub const BOSS_MAX_HEALTH: i32 = 300;

/// Tick information handed to a boss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickState {
    pub current_tick: u64,
}

/// What a boss did this tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickResult {
    pub dead: bool,
    pub bullets: Vec<Bullet>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthState {
    pub health: i32,
    pub max_health: i32,
}

/// A tick-driven adversary.
pub trait Boss: HasRectangle {
    /// Advances the boss by one tick. `platforms` is the level's platform
    /// list; bosses that reshape the arena toggle entries in place.
    fn tick(&mut self, state: &TickState, platforms: &mut [Platform]) -> TickResult;
    fn health(&self) -> HealthState;
    fn reset(&mut self, platforms: &mut [Platform]);
}

// ---------------------------------------------------------------------------
// V1: drifting healer
// ---------------------------------------------------------------------------

const V1_HEALING_THRESHOLD: i32 = 100;
const V1_HEAL_INTERVAL: u64 = 20;
const V1_HEAL_AMOUNT: i32 = 50;
const V1_DAMAGE_INTERVAL: u64 = 30;
const V1_DRIFT_STEP: i64 = 10;
const V1_DRIFT_RADIUS: f64 = 100.0;
const V1_BULLET_DAMAGE: i32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum V1Stage {
    #[default]
    Initial,
    Healing,
    Death,
}

/// Bullet pattern of one [`V1Stage`].
struct Volley {
    count: usize,
    spread: i64,
    seek_speed: f64,
    self_damage: i32,
}

impl V1Stage {
    fn volley(self) -> Volley {
        match self {
            V1Stage::Initial | V1Stage::Healing => Volley {
                count: 1,
                spread: 50,
                seek_speed: 2.0,
                self_damage: 4,
            },
            V1Stage::Death => Volley {
                count: 10,
                spread: 500,
                seek_speed: 20.0,
                self_damage: 8,
            },
        }
    }
}

/// Drifts around its spawn point firing homing bullets. Heals once when
/// weakened, then enters a frantic final stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossV1 {
    pub body: Body,
    pub stage: V1Stage,
    pub health: i32,
    start_tick: Option<u64>,
    initial_location: Point,
    bullet_damage: i32,
}

impl BossV1 {
    pub fn new(body: Body, rules: &Rules) -> Self {
        Self {
            initial_location: body.origin,
            body,
            stage: V1Stage::Initial,
            health: BOSS_MAX_HEALTH,
            start_tick: None,
            bullet_damage: rules.hazard(V1_BULLET_DAMAGE),
        }
    }
}

impl Boss for BossV1 {
    fn tick(&mut self, state: &TickState, _platforms: &mut [Platform]) -> TickResult {
        let tick = state.current_tick;
        let start = *self.start_tick.get_or_insert(tick);
        let elapsed = tick.saturating_sub(start);

        if self.health <= 0 {
            return TickResult {
                dead: true,
                bullets: Vec::new(),
            };
        }

        if self.stage == V1Stage::Initial && self.health < V1_HEALING_THRESHOLD {
            self.stage = V1Stage::Healing;
        }
        if self.stage == V1Stage::Healing {
            if elapsed % V1_HEAL_INTERVAL == 0 {
                self.health += V1_HEAL_AMOUNT;
            }
            if self.health >= BOSS_MAX_HEALTH {
                self.health = BOSS_MAX_HEALTH;
                self.stage = V1Stage::Death;
            }
        }

        let volley = self.stage.volley();
        if elapsed % V1_DAMAGE_INTERVAL == 0 {
            self.health -= volley.self_damage;
        }

        let mut rng = tick_rng(tick);
        let bullets = (0..volley.count)
            .map(|_| {
                let dx = rand_int(&mut rng, -volley.spread, volley.spread) as f64;
                let dy = rand_int(&mut rng, -volley.spread, volley.spread) as f64;
                Bullet::new(
                    self.body.origin + Vector::new(dx, dy),
                    Vector::new(dx, dy),
                    self.bullet_damage,
                    volley.seek_speed,
                )
            })
            .collect();

        let dead = self.health <= 0;
        if !dead {
            let mut rng = tick_rng(tick);
            let mut drift = Vector::new(
                rand_int(&mut rng, -V1_DRIFT_STEP, V1_DRIFT_STEP) as f64,
                rand_int(&mut rng, -V1_DRIFT_STEP, V1_DRIFT_STEP) as f64,
            );
            if ((self.body.origin + drift) - self.initial_location).length() > V1_DRIFT_RADIUS {
                drift = -drift;
            }
            self.body.move_by(drift);
        }

        TickResult { dead, bullets }
    }

    fn health(&self) -> HealthState {
        HealthState {
            health: self.health,
            max_health: BOSS_MAX_HEALTH,
        }
    }

    fn reset(&mut self, _platforms: &mut [Platform]) {
        self.health = BOSS_MAX_HEALTH;
        self.stage = V1Stage::Initial;
        self.start_tick = None;
        self.body.move_to(self.initial_location);
    }
}

impl HasRectangle for BossV1 {
    fn rectangle(&self) -> Rectangle {
        self.body.rectangle()
    }
}

// ---------------------------------------------------------------------------
// V2: platform shifter
// ---------------------------------------------------------------------------

const V2_SHOOT_ODDS: i64 = 10;
const V2_SWITCH_ODDS: i64 = 20;
const V2_MAX_DISABLED: usize = 3;
const V2_DAMAGE_INTERVAL: u64 = 30;
const V2_SELF_DAMAGE: i32 = 4;
const V2_BULLET_DAMAGE: i32 = 5;
const V2_BULLET_SPREAD: i64 = 50;
const V2_BULLET_SPEED: f64 = -5.0;
const V2_TRAVEL_BAND: f64 = 350.0;
const V2_INITIAL_MOVE: Vector = Vector::new(0.0, -5.0);

/// Bobs vertically inside a band, fires straight volleys and knocks arena
/// platforms out from under the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossV2 {
    pub body: Body,
    pub health: i32,
    /// Indices into the level's platform list.
    arena_platforms: Vec<usize>,
    disabled: VecDeque<usize>,
    start_tick: Option<u64>,
    initial_location: Point,
    previous_move: Vector,
    bullet_damage: i32,
}

impl BossV2 {
    pub fn new(body: Body, arena_platforms: Vec<usize>, rules: &Rules) -> Self {
        Self {
            initial_location: body.origin,
            body,
            health: BOSS_MAX_HEALTH,
            arena_platforms,
            disabled: VecDeque::new(),
            start_tick: None,
            previous_move: V2_INITIAL_MOVE,
            bullet_damage: rules.hazard(V2_BULLET_DAMAGE),
        }
    }

    pub fn arena_platform_indices(&self) -> &[usize] {
        &self.arena_platforms
    }

    /// Platforms currently knocked out, oldest first.
    pub fn disabled_platforms(&self) -> impl Iterator<Item = usize> + '_ {
        self.disabled.iter().copied()
    }

    fn switch_platform<R: Rng>(&mut self, rng: &mut R, platforms: &mut [Platform]) {
        if self.arena_platforms.is_empty() {
            return;
        }
        let pick = rng.gen_range(0..self.arena_platforms.len());
        let index = self.arena_platforms[pick];
        if let Some(platform) = platforms.get_mut(index) {
            platform.collisions_disabled = true;
        }
        self.disabled.push_back(index);

        while self.disabled.len() > V2_MAX_DISABLED {
            let Some(oldest) = self.disabled.pop_front() else {
                break;
            };
            // The same platform can be queued twice; keep it down while a
            // newer entry still holds it.
            if self.disabled.contains(&oldest) {
                continue;
            }
            if let Some(platform) = platforms.get_mut(oldest) {
                platform.collisions_disabled = false;
            }
        }
    }
}

impl Boss for BossV2 {
    fn tick(&mut self, state: &TickState, platforms: &mut [Platform]) -> TickResult {
        let tick = state.current_tick;
        let start = *self.start_tick.get_or_insert(tick);

        if self.health <= 0 {
            return TickResult {
                dead: true,
                bullets: Vec::new(),
            };
        }

        let mut rng = tick_rng(tick);
        let mut bullets = Vec::new();
        if rng.gen_range(0..V2_SHOOT_ODDS) == 0 {
            for _ in 0..2 {
                let dx = rand_int(&mut rng, -V2_BULLET_SPREAD, V2_BULLET_SPREAD) as f64;
                let dy = rand_int(&mut rng, -V2_BULLET_SPREAD, V2_BULLET_SPREAD) as f64;
                let aim = rand_int(&mut rng, -1, 1) as f64;
                bullets.push(Bullet::new(
                    self.body.origin + Vector::new(dx, dy),
                    Vector::new(V2_BULLET_SPEED, aim),
                    self.bullet_damage,
                    0.0,
                ));
            }
        }

        if rng.gen_range(0..V2_SWITCH_ODDS) == 0 {
            self.switch_platform(&mut rng, platforms);
        }

        if tick.saturating_sub(start) % V2_DAMAGE_INTERVAL == 0 {
            self.health -= V2_SELF_DAMAGE;
        }
        let dead = self.health <= 0;

        let mut step = self.previous_move;
        let offset = self.body.origin.y - self.initial_location.y;
        if offset > V2_TRAVEL_BAND {
            step.y = -step.y.abs();
        } else if offset < -V2_TRAVEL_BAND {
            step.y = step.y.abs();
        }
        self.body.move_by(step);
        self.previous_move = step;

        TickResult { dead, bullets }
    }

    fn health(&self) -> HealthState {
        HealthState {
            health: self.health,
            max_health: BOSS_MAX_HEALTH,
        }
    }

    fn reset(&mut self, platforms: &mut [Platform]) {
        for index in self.disabled.drain(..) {
            if let Some(platform) = platforms.get_mut(index) {
                platform.collisions_disabled = false;
            }
        }
        self.health = BOSS_MAX_HEALTH;
        self.start_tick = None;
        self.previous_move = V2_INITIAL_MOVE;
        self.body.move_to(self.initial_location);
    }
}

impl HasRectangle for BossV2 {
    fn rectangle(&self) -> Rectangle {
        self.body.rectangle()
    }
}

// ---------------------------------------------------------------------------
// BossEntity
// ---------------------------------------------------------------------------

/// The boss variants a level can place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum BossEntity {
    V1(BossV1),
    V2(BossV2),
}

impl BossEntity {
    fn inner(&self) -> &dyn Boss {
        match self {
            BossEntity::V1(b) => b,
            BossEntity::V2(b) => b,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Boss {
        match self {
            BossEntity::V1(b) => b,
            BossEntity::V2(b) => b,
        }
    }
}

impl Boss for BossEntity {
    fn tick(&mut self, state: &TickState, platforms: &mut [Platform]) -> TickResult {
        self.inner_mut().tick(state, platforms)
    }

    fn health(&self) -> HealthState {
        self.inner().health()
    }

    fn reset(&mut self, platforms: &mut [Platform]) {
        self.inner_mut().reset(platforms);
    }
}

impl HasRectangle for BossEntity {
    fn rectangle(&self) -> Rectangle {
        self.inner().rectangle()
    }
}

impl Collidable for BossEntity {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
