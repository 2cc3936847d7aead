//! The [`Engine`]: one live match.
//!
//! An engine owns every entity of a level plus the per-match state (tick
//! counter, pause and win flags, the active sub-game). It is created from a
//! [`LevelDef`], optionally seeded from a persisted [`Snapshot`], and then
//! mutated exclusively through [`Engine::update`] (see `tick.rs`).

use serde::Serialize;
use tracing::{debug, info};
use verity_world::prelude::*;

use crate::boss::{Boss, BossEntity};
use crate::config::EngineConfig;
use crate::level::{BossArena, LevelContent, LevelDef};
use crate::player::{Player, PLAYER_HEIGHT, PLAYER_WIDTH};
use crate::snapshot::{ItemRecord, PersistenceError, Snapshot, SnapshotStore};
use crate::subgame::{SubGameKind, SubGameProvider, SubGameState, Trigger};
use crate::{EngineError, LevelError};

/// The trigger whose sub-game currently has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActiveInteraction {
    pub kind: SubGameKind,
    pub index: usize,
}

/// On-screen message. Presentation only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub text: String,
    pub expires_at: u64,
}

/// A single match.
pub struct Engine {
    pub(crate) config: EngineConfig,
    /// Digest of the static tiles, which never change after construction.
    pub(crate) level_digest: String,
    pub(crate) tiles: Vec<StaticTile>,
    pub(crate) background: Vec<BackgroundImage>,
    pub(crate) player_spawn: Point,
    pub(crate) player: Player,
    pub(crate) items: Vec<Item>,
    pub(crate) portals: Vec<Portal>,
    pub(crate) spikes: Vec<Spike>,
    pub(crate) platforms: Vec<Platform>,
    pub(crate) npcs: Vec<Trigger>,
    pub(crate) arcades: Vec<Trigger>,
    pub(crate) slots: Vec<SlotMachine>,
    pub(crate) enemy_bullets: Vec<Bullet>,
    pub(crate) boss: Option<BossEntity>,
    pub(crate) boss_arena: Option<BossArena>,
    pub(crate) boss_entered: bool,
    pub(crate) active: Option<ActiveInteraction>,
    pub(crate) notification: Option<Notification>,
    pub(crate) camera: Body,
    pub(crate) paused: bool,
    pub(crate) is_win: bool,
    pub(crate) tick: u64,
    pub(crate) start_snapshot: Option<Snapshot>,
    pub(crate) store: Option<SnapshotStore>,
    /// Persistence failure recorded mid-tick, reported once the tick is done.
    pub(crate) deferred: Option<PersistenceError>,
}

impl Engine {
    /// Builds a fresh match for `level`.
    pub fn new(config: EngineConfig, level: &LevelDef, provider: &dyn SubGameProvider) -> Result<Self, LevelError> {
        let content = LevelContent::build(level, &config.rules, provider)?;
        let level_digest = digest_tiles(&content.tiles)?;
        let (boss, boss_arena) = match content.boss {
            Some((boss, arena)) => (Some(boss), Some(arena)),
            None => (None, None),
        };
        let store = config.snapshots_dir.clone().map(SnapshotStore::new);
        let camera = Body::new(Point::new(0.0, 0.0), config.view_width, config.view_height);

        let mut engine = Self {
            level_digest,
            tiles: content.tiles,
            background: content.background,
            player_spawn: content.player_spawn,
            player: Player::new(content.player_spawn, config.rules.player_health),
            items: content.items,
            portals: content.portals,
            spikes: content.spikes,
            platforms: content.platforms,
            npcs: content.npcs,
            arcades: content.arcades,
            slots: content.slots,
            enemy_bullets: Vec::new(),
            boss,
            boss_arena,
            boss_entered: false,
            active: None,
            notification: None,
            camera,
            paused: false,
            is_win: false,
            tick: 0,
            start_snapshot: None,
            store,
            deferred: None,
            config,
        };
        engine.center_camera();

        info!(
            level = %engine.config.level,
            items = engine.items.len(),
            boss = engine.boss.is_some(),
            "engine created"
        );
        Ok(engine)
    }

    /// Builds a match for `level` and restores collected-item progress from
    /// `snapshot`. Physics state always starts fresh.
    pub fn from_snapshot(
        config: EngineConfig,
        level: &LevelDef,
        provider: &dyn SubGameProvider,
        snapshot: Snapshot,
    ) -> Result<Self, LevelError> {
        let mut engine = Self::new(config, level, provider)?;
        for record in &snapshot.items {
            if let Some(item) = engine.items.iter_mut().find(|i| i.name == record.name) {
                item.collected = record.collected;
                item.important = record.important;
            }
        }
        engine.player.inventory.items = engine
            .items
            .iter()
            .filter(|i| i.collected)
            .map(|i| i.name.clone())
            .collect();
        debug!(restored = engine.player.inventory.items.len(), "progress restored from snapshot");
        engine.start_snapshot = Some(snapshot);
        Ok(engine)
    }

    // -- accessors ----------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn level(&self) -> &str {
        &self.config.level
    }

    /// Ticks since the match started or was last restarted.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_win(&self) -> bool {
        self.is_win
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    /// Direct access for tools and tests.
    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    pub fn player_spawn(&self) -> Point {
        self.player_spawn
    }

    pub fn tiles(&self) -> &[StaticTile] {
        &self.tiles
    }

    pub fn background(&self) -> &[BackgroundImage] {
        &self.background
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Direct access for tools and tests.
    pub fn items_mut(&mut self) -> &mut [Item] {
        &mut self.items
    }

    pub fn portals(&self) -> &[Portal] {
        &self.portals
    }

    pub fn spikes(&self) -> &[Spike] {
        &self.spikes
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    pub fn npcs(&self) -> &[Trigger] {
        &self.npcs
    }

    pub fn arcades(&self) -> &[Trigger] {
        &self.arcades
    }

    pub fn slots(&self) -> &[SlotMachine] {
        &self.slots
    }

    pub fn enemy_bullets(&self) -> &[Bullet] {
        &self.enemy_bullets
    }

    pub fn boss(&self) -> Option<&BossEntity> {
        self.boss.as_ref()
    }

    pub fn boss_entered(&self) -> bool {
        self.boss_entered
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn camera(&self) -> Rectangle {
        self.camera.rectangle()
    }

    /// Snapshot this match was restored from, if any.
    pub fn start_snapshot(&self) -> Option<&Snapshot> {
        self.start_snapshot.as_ref()
    }

    // -- sub-games ----------------------------------------------------------

    pub fn active_interaction(&self) -> Option<ActiveInteraction> {
        self.active
    }

    pub(crate) fn trigger(&self, active: ActiveInteraction) -> Option<&Trigger> {
        match active.kind {
            SubGameKind::Dialog => self.npcs.get(active.index),
            SubGameKind::Arcade => self.arcades.get(active.index),
        }
    }

    pub(crate) fn trigger_mut(&mut self, active: ActiveInteraction) -> Option<&mut Trigger> {
        match active.kind {
            SubGameKind::Dialog => self.npcs.get_mut(active.index),
            SubGameKind::Arcade => self.arcades.get_mut(active.index),
        }
    }

    /// Kind and state of the sub-game that has focus.
    pub fn active_sub_game(&self) -> Option<(SubGameKind, SubGameState)> {
        let active = self.active?;
        self.trigger(active).map(|t| (active.kind, t.state()))
    }

    /// Overwrites the focused sub-game's state with an authoritative copy.
    /// Returns false when no sub-game has focus.
    pub fn apply_sub_game_state(&mut self, state: SubGameState) -> bool {
        let Some(active) = self.active else {
            return false;
        };
        match self.trigger_mut(active) {
            Some(trigger) => {
                trigger.game.apply_state(state);
                true
            }
            None => false,
        }
    }

    // -- snapshots ----------------------------------------------------------

    /// Collected-item progress as a persistable record.
    pub fn make_snapshot(&self) -> Snapshot {
        Snapshot::now(
            self.items
                .iter()
                .map(|i| ItemRecord {
                    name: i.name.clone(),
                    important: i.important,
                    collected: i.collected,
                })
                .collect(),
        )
    }

    /// Writes `snapshot` to the configured store. Without a store this is a
    /// no-op returning `None`.
    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<Option<std::path::PathBuf>, PersistenceError> {
        match &self.store {
            Some(store) => store.save(&self.config.level, snapshot).map(Some),
            None => Ok(None),
        }
    }

    // -- lifecycle helpers --------------------------------------------------

    /// Restart after death or on request.
    pub(crate) fn reset(&mut self) {
        self.player.respawn(self.player_spawn, self.config.rules.player_health);
        self.active = None;
        self.notification = None;
        self.enemy_bullets.clear();
        self.tick = 0;
        self.boss_entered = false;
        if let Some(boss) = self.boss.as_mut() {
            boss.reset(&mut self.platforms);
        }
        if let Some(arena) = self.boss_arena {
            if let Some(portal) = self.portals.get_mut(arena.portal) {
                portal.move_to(arena.portal_origin);
            }
        }
        debug!("match reset");
    }

    pub(crate) fn notify(&mut self, text: impl Into<String>) {
        self.notification = Some(Notification {
            text: text.into(),
            expires_at: self.tick + self.config.notification_ticks,
        });
    }

    pub(crate) fn center_camera(&mut self) {
        let offset = Vector::new(
            -self.camera.width / 2.0 + PLAYER_WIDTH / 2.0,
            -self.camera.height / 2.0 + PLAYER_HEIGHT / 2.0,
        );
        self.camera.move_to(self.player.body.origin + offset);
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("level", &self.config.level)
            .field("tick", &self.tick)
            .field("paused", &self.paused)
            .field("is_win", &self.is_win)
            .field("player", &self.player)
            .finish_non_exhaustive()
    }
}

fn digest_tiles(tiles: &[StaticTile]) -> Result<String, LevelError> {
    let bytes = serde_json::to_vec(tiles)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
